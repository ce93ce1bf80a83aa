//! Caller identity extraction.
//!
//! Token verification happens upstream; this service only sees the already
//! verified user id, forwarded in a trusted header. An opaque id is all the
//! ownership checks need.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the verified user id.
pub const USER_ID_HEADER: &str = "x-user-id";

fn user_id_from(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Extractor for routes that require an authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from(parts)
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

/// Extractor for the public share path: identity is recorded when present,
/// never required.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<String>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(user_id_from(parts)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_header(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/packets");
        if let Some(value) = value {
            builder = builder.header(USER_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_auth_user_present() {
        let mut parts = parts_with_header(Some("auth0|abc123"));
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.0, "auth0|abc123");
    }

    #[tokio::test]
    async fn test_auth_user_missing_is_unauthorized() {
        let mut parts = parts_with_header(None);
        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_auth_user_blank_is_unauthorized() {
        let mut parts = parts_with_header(Some("   "));
        let result = AuthUser::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_maybe_user_absent_is_none() {
        let mut parts = parts_with_header(None);
        let MaybeUser(user) = MaybeUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user, None);
    }
}
