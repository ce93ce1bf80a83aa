use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::config::Environment;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("User not authenticated")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unimplemented(String),

    #[error("share code space exhausted after {0} attempts")]
    ShareCodeExhausted(u32),
}

/// Internal detail is only exposed on development-like environments;
/// production callers get the generic message alone.
fn detail_for(environment: Environment, detail: String) -> Option<String> {
    environment.is_development().then_some(detail)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    detail_for(Environment::current(), e.to_string()),
                )
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "User not authenticated".to_string(),
                None,
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Unimplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg.clone(), None),
            AppError::ShareCodeExhausted(attempts) => {
                tracing::error!("Share code generation exhausted {} attempts", attempts);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate share code".to_string(),
                    detail_for(Environment::current(), self.to_string()),
                )
            }
        };

        let mut body = json!({
            "success": false,
            "message": message,
        });
        if let Some(detail) = detail {
            body["error"] = json!(detail);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                AppError::NotFound("Packet not found or access denied".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::BadRequest("Invalid packet ID".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Unimplemented("Paid sharing not yet implemented".into()),
                StatusCode::NOT_IMPLEMENTED,
            ),
            (
                AppError::ShareCodeExhausted(10),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_detail_withheld_outside_development() {
        let detail = "connection refused".to_string();
        assert_eq!(
            detail_for(Environment::Development, detail.clone()),
            Some(detail.clone())
        );
        assert_eq!(detail_for(Environment::Production, detail), None);
    }
}
