//! Share codes and share modes for public packet access.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 32-symbol alphabet for share codes. Visually ambiguous characters
/// (0/O, 1/I) are excluded so codes survive being read aloud or copied
/// from a screenshot.
const SHARE_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Length of a generated share code.
pub const SHARE_CODE_LEN: usize = 8;

/// Draw a random share code. Global uniqueness is the caller's problem;
/// this only guarantees shape.
pub fn generate_share_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SHARE_CODE_LEN)
        .map(|_| SHARE_CODE_ALPHABET[rng.gen_range(0..SHARE_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Visibility mode of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareType {
    Private,
    Free,
    Paid,
}

impl ShareType {
    pub fn as_str(self) -> &'static str {
        match self {
            ShareType::Private => "private",
            ShareType::Free => "free",
            ShareType::Paid => "paid",
        }
    }
}

impl fmt::Display for ShareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown share type: {0}")]
pub struct ParseShareTypeError(String);

impl FromStr for ShareType {
    type Err = ParseShareTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(ShareType::Private),
            "free" => Ok(ShareType::Free),
            "paid" => Ok(ShareType::Paid),
            other => Err(ParseShareTypeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_code_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_share_code(&mut rng);
            assert_eq!(code.len(), SHARE_CODE_LEN);
            assert!(code.bytes().all(|b| SHARE_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_alphabet_excludes_ambiguous_symbols() {
        for ambiguous in [b'0', b'O', b'1', b'I'] {
            assert!(!SHARE_CODE_ALPHABET.contains(&ambiguous));
        }
        assert_eq!(SHARE_CODE_ALPHABET.len(), 32);
    }

    #[test]
    fn test_share_type_round_trip() {
        for ty in [ShareType::Private, ShareType::Free, ShareType::Paid] {
            assert_eq!(ty.as_str().parse::<ShareType>().unwrap(), ty);
        }
        assert!("premium".parse::<ShareType>().is_err());
    }

    #[test]
    fn test_share_type_serde_lowercase() {
        assert_eq!(serde_json::to_string(&ShareType::Free).unwrap(), r#""free""#);
        let ty: ShareType = serde_json::from_str(r#""paid""#).unwrap();
        assert_eq!(ty, ShareType::Paid);
    }
}
