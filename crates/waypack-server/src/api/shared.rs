use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::MaybeUser;
use crate::db::{models::PacketTree, Visitor};
use crate::error::AppError;
use crate::AppState;

use super::packets::DayData;
use super::ApiResponse;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorData {
    name: &'static str,
    user_id: String,
}

/// Public shape of a shared packet. No cost, no share code, no timestamps
/// beyond creation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SharedPacketData {
    id: i32,
    name: String,
    description: Option<String>,
    share_type: String,
    share_views: i32,
    author: AuthorData,
    itinerary_days: Vec<DayData>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SharedContentData {
    packet: SharedPacketData,
}

impl From<PacketTree> for SharedContentData {
    fn from(tree: PacketTree) -> Self {
        Self {
            packet: SharedPacketData {
                id: tree.packet.id,
                name: tree.packet.name,
                description: tree.packet.description,
                share_type: tree.packet.share_type,
                share_views: tree.packet.share_views,
                author: AuthorData {
                    // User profiles live in another service; the id is all
                    // we can attribute here.
                    name: "Travel Planner",
                    user_id: tree.packet.user_id,
                },
                itinerary_days: tree.days.into_iter().map(Into::into).collect(),
                created_at: tree.packet.created_at,
            },
        }
    }
}

/// Client address as reported by the reverse proxy.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
}

/// Access shared content by share code. No authentication; a valid code is
/// the capability.
async fn get_shared_content(
    State(state): State<AppState>,
    MaybeUser(visitor_user): MaybeUser,
    Path(share_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SharedContentData>>, AppError> {
    let visitor = Visitor {
        ip: client_ip(&headers),
        user_id: visitor_user,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    };

    let tree = state
        .db
        .get_shared_content(&share_code, &visitor)
        .await?
        .ok_or_else(|| AppError::NotFound("Shared content not found".to_string()))?;

    Ok(Json(ApiResponse::ok(
        tree.into(),
        "Shared content retrieved successfully",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/shared/{share_code}", get(get_shared_content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Packet;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.2"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_ip(&headers).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_client_ip_absent() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_shared_content_hides_cost_and_share_code() {
        let tree = PacketTree {
            packet: Packet {
                id: 3,
                user_id: "auth0|owner".to_string(),
                name: "Kyoto Weekend".to_string(),
                description: None,
                cost: Some("900".to_string()),
                currency_code: "USD".to_string(),
                share_code: Some("B7C8D9E2".to_string()),
                share_type: "free".to_string(),
                share_enabled_at: Some(Utc::now()),
                share_views: 12,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            days: vec![],
        };
        let value = serde_json::to_value(SharedContentData::from(tree)).unwrap();
        let packet = &value["packet"];
        assert_eq!(packet["shareViews"], 12);
        assert_eq!(packet["author"]["userId"], "auth0|owner");
        assert!(packet.get("cost").is_none());
        assert!(packet.get("shareCode").is_none());
    }
}
