mod health;
pub mod packets;
mod shared;

use axum::Router;
use serde::Serialize;

use crate::AppState;

/// Success envelope shared by every endpoint. Errors produce the matching
/// `success: false` envelope via `AppError`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            count: None,
            message: message.into(),
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    /// List envelope with the item count alongside the data.
    pub fn list(data: Vec<T>, message: impl Into<String>) -> Self {
        let count = data.len();
        Self {
            success: true,
            data: Some(data),
            count: Some(count),
            message: message.into(),
        }
    }
}

impl ApiResponse<()> {
    /// Envelope for operations with nothing to return, e.g. deletes.
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            count: None,
            message: message.into(),
        }
    }
}

/// Create the API router
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(packets::router())
        .merge(shared::router())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope_shape() {
        let value = serde_json::to_value(ApiResponse::ok(42, "done")).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], 42);
        assert_eq!(value["message"], "done");
        assert!(value.get("count").is_none());
    }

    #[test]
    fn test_list_envelope_carries_count() {
        let value = serde_json::to_value(ApiResponse::list(vec!["a", "b"], "listed")).unwrap();
        assert_eq!(value["count"], 2);
        assert_eq!(value["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_message_only_envelope_omits_data() {
        let value = serde_json::to_value(ApiResponse::message_only("deleted")).unwrap();
        assert_eq!(value["success"], true);
        assert!(value.get("data").is_none());
        assert!(value.get("count").is_none());
    }
}
