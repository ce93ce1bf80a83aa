use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use waypack_core::{DayInput, ShareType};

use crate::auth::AuthUser;
use crate::db::models::{
    DayWithMarkers, Marker, Packet, PacketFields, PacketShareAccess, PacketTree,
};
use crate::error::AppError;
use crate::AppState;

use super::ApiResponse;

/// Body of POST /api/packets and PUT /api/packets/{id}.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub itinerary_days: Vec<DayInput>,
}

/// Body of POST /api/packets/with-itinerary. Same scalar fields, but the
/// tree arrives under `itinerary`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketWithItineraryPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub itinerary: Vec<DayInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub share_type: ShareType,
}

impl PacketPayload {
    fn fields(&self) -> PacketFields {
        PacketFields {
            name: self.name.clone(),
            description: self.description.clone(),
            cost: self.cost.clone(),
            currency_code: self.currency_code.clone(),
        }
    }
}

impl PacketWithItineraryPayload {
    fn fields(&self) -> PacketFields {
        PacketFields {
            name: self.name.clone(),
            description: self.description.clone(),
            cost: self.cost.clone(),
            currency_code: self.currency_code.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketData {
    pub id: i32,
    pub name: String,
    pub user_id: String,
    pub description: Option<String>,
    pub cost: Option<String>,
    pub currency_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Packet> for PacketData {
    fn from(packet: Packet) -> Self {
        Self {
            id: packet.id,
            name: packet.name,
            user_id: packet.user_id,
            description: packet.description,
            cost: packet.cost,
            currency_code: packet.currency_code,
            created_at: packet.created_at,
            updated_at: packet.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerData {
    pub id: String,
    pub day_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lng: String,
    pub lat: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Marker> for MarkerData {
    fn from(marker: Marker) -> Self {
        Self {
            id: marker.id,
            day_id: marker.day_id,
            title: marker.title,
            description: marker.description,
            kind: marker.kind,
            lng: marker.lng,
            lat: marker.lat,
            sort_order: marker.sort_order,
            created_at: marker.created_at,
            updated_at: marker.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayData {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub day_number: i32,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub markers: Vec<MarkerData>,
}

impl From<DayWithMarkers> for DayData {
    fn from(entry: DayWithMarkers) -> Self {
        Self {
            id: entry.day.id,
            name: entry.day.name,
            description: entry.day.description,
            day_number: entry.day.day_number,
            sort_order: entry.day.sort_order,
            created_at: entry.day.created_at,
            updated_at: entry.day.updated_at,
            markers: entry.markers.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketTreeData {
    #[serde(flatten)]
    pub packet: PacketData,
    pub itinerary_days: Vec<DayData>,
}

impl From<PacketTree> for PacketTreeData {
    fn from(tree: PacketTree) -> Self {
        Self {
            packet: tree.packet.into(),
            itinerary_days: tree.days.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareData {
    pub share_code: String,
    pub share_url: String,
    pub share_type: String,
    pub share_views: i32,
    pub share_enabled_at: Option<DateTime<Utc>>,
}

impl ShareData {
    /// None when the packet has no active share code.
    fn from_packet(packet: &Packet, base_url: &str) -> Option<Self> {
        let code = packet.share_code.as_ref()?;
        Some(Self {
            share_code: code.clone(),
            share_url: format!("{base_url}/shared/{code}"),
            share_type: packet.share_type.clone(),
            share_views: packet.share_views,
            share_enabled_at: packet.share_enabled_at,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessData {
    pub visitor_ip: Option<String>,
    pub visitor_user_id: Option<String>,
    pub access_type: String,
    pub user_agent: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

impl From<PacketShareAccess> for AccessData {
    fn from(row: PacketShareAccess) -> Self {
        Self {
            visitor_ip: row.visitor_ip,
            visitor_user_id: row.visitor_user_id,
            access_type: row.access_type,
            user_agent: row.user_agent,
            accessed_at: row.accessed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareStatsData {
    #[serde(flatten)]
    pub share: ShareData,
    pub recent_access: Vec<AccessData>,
}

fn parse_packet_id(raw: &str) -> Result<i32, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest("Invalid packet ID".to_string()))
}

fn packet_not_found() -> AppError {
    AppError::NotFound("Packet not found or access denied".to_string())
}

/// List all packets of the current user
async fn list_packets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ApiResponse<Vec<PacketData>>>, AppError> {
    let packets = state.db.list_packets(&user_id).await?;
    let data: Vec<PacketData> = packets.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::list(
        data,
        "Packets retrieved successfully",
    )))
}

/// Create a new packet
async fn create_packet(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PacketPayload>,
) -> Result<(StatusCode, Json<ApiResponse<PacketData>>), AppError> {
    let tree = state
        .db
        .create_packet(&user_id, &payload.fields(), &payload.itinerary_days)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            tree.packet.into(),
            "Packet created successfully",
        )),
    ))
}

/// Create a new packet and return the full assembled tree
async fn create_packet_with_itinerary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PacketWithItineraryPayload>,
) -> Result<(StatusCode, Json<ApiResponse<PacketTreeData>>), AppError> {
    let tree = state
        .db
        .create_packet(&user_id, &payload.fields(), &payload.itinerary)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            tree.into(),
            "Packet and itinerary created successfully",
        )),
    ))
}

/// Get one packet with its itinerary tree
async fn get_packet(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PacketTreeData>>, AppError> {
    let packet_id = parse_packet_id(&id)?;
    let tree = state
        .db
        .get_packet_tree(&user_id, packet_id)
        .await?
        .ok_or_else(packet_not_found)?;
    Ok(Json(ApiResponse::ok(
        tree.into(),
        "Packet details retrieved successfully",
    )))
}

/// Same data as [`get_packet`], kept as its own route for client
/// compatibility.
async fn get_packet_with_itinerary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<PacketTreeData>>, AppError> {
    let packet_id = parse_packet_id(&id)?;
    let tree = state
        .db
        .get_packet_tree(&user_id, packet_id)
        .await?
        .ok_or_else(packet_not_found)?;
    Ok(Json(ApiResponse::ok(
        tree.into(),
        "Packet and itinerary details retrieved successfully",
    )))
}

/// Full update: scalar fields plus itinerary tree reconciliation
async fn update_packet(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(payload): Json<PacketPayload>,
) -> Result<Json<ApiResponse<PacketTreeData>>, AppError> {
    let packet_id = parse_packet_id(&id)?;
    let tree = state
        .db
        .update_packet(&user_id, packet_id, &payload.fields(), &payload.itinerary_days)
        .await?
        .ok_or_else(packet_not_found)?;
    Ok(Json(ApiResponse::ok(
        tree.into(),
        "Packet updated successfully",
    )))
}

/// Delete a packet and its whole tree
async fn delete_packet(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let packet_id = parse_packet_id(&id)?;
    if !state.db.delete_packet(&user_id, packet_id).await? {
        return Err(packet_not_found());
    }
    Ok(Json(ApiResponse::message_only(
        "Packet deleted successfully",
    )))
}

/// Enable sharing with a freshly generated code
async fn enable_sharing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ShareRequest>,
) -> Result<Json<ApiResponse<ShareData>>, AppError> {
    let packet_id = parse_packet_id(&id)?;
    if request.share_type == ShareType::Private {
        return Err(AppError::BadRequest("Invalid share type".to_string()));
    }

    let packet = state
        .db
        .enable_sharing(&user_id, packet_id, request.share_type)
        .await?
        .ok_or_else(packet_not_found)?;
    let share = ShareData::from_packet(&packet, &state.config.share_base_url)
        .ok_or_else(|| AppError::BadRequest("Packet is not currently shared".to_string()))?;
    Ok(Json(ApiResponse::ok(share, "Sharing enabled successfully")))
}

/// Disable sharing; the old code stops resolving immediately
async fn disable_sharing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let packet_id = parse_packet_id(&id)?;
    state
        .db
        .disable_sharing(&user_id, packet_id)
        .await?
        .ok_or_else(packet_not_found)?;
    Ok(Json(ApiResponse::message_only(
        "Sharing disabled successfully",
    )))
}

/// Share metadata, view counter and recent public accesses
async fn share_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ShareStatsData>>, AppError> {
    let packet_id = parse_packet_id(&id)?;
    let (packet, recent) = state
        .db
        .share_stats(&user_id, packet_id)
        .await?
        .ok_or_else(packet_not_found)?;
    let share = ShareData::from_packet(&packet, &state.config.share_base_url)
        .ok_or_else(|| AppError::BadRequest("Packet is not currently shared".to_string()))?;
    let stats = ShareStatsData {
        share,
        recent_access: recent.into_iter().map(Into::into).collect(),
    };
    Ok(Json(ApiResponse::ok(
        stats,
        "Share stats retrieved successfully",
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/packets", get(list_packets).post(create_packet))
        .route(
            "/api/packets/with-itinerary",
            post(create_packet_with_itinerary),
        )
        .route(
            "/api/packets/{id}",
            get(get_packet).put(update_packet).delete(delete_packet),
        )
        .route(
            "/api/packets/{id}/with-itinerary",
            get(get_packet_with_itinerary),
        )
        .route(
            "/api/packets/{id}/share",
            get(share_stats).post(enable_sharing).delete(disable_sharing),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        Packet {
            id: 7,
            user_id: "auth0|u1".to_string(),
            name: "Tokyo Trip".to_string(),
            description: Some("5 days".to_string()),
            cost: Some("1200.50".to_string()),
            currency_code: "JPY".to_string(),
            share_code: Some("A2B3C4D5".to_string()),
            share_type: "free".to_string(),
            share_enabled_at: Some(Utc::now()),
            share_views: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_packet_id() {
        assert_eq!(parse_packet_id("42").unwrap(), 42);
        assert!(matches!(
            parse_packet_id("not-a-number"),
            Err(AppError::BadRequest(_))
        ));
        assert!(parse_packet_id("").is_err());
    }

    #[test]
    fn test_marker_data_serializes_kind_as_type() {
        let marker = Marker {
            id: "m-1".to_string(),
            day_id: "d-1".to_string(),
            packet_id: 7,
            user_id: "auth0|u1".to_string(),
            title: "Shibuya Crossing".to_string(),
            description: None,
            kind: Some("sight".to_string()),
            lng: "139.7004".to_string(),
            lat: "35.6595".to_string(),
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(MarkerData::from(marker)).unwrap();
        assert_eq!(value["type"], "sight");
        assert_eq!(value["dayId"], "d-1");
        assert_eq!(value["sortOrder"], 0);
        assert!(value.get("kind").is_none());
        assert!(value.get("userId").is_none());
    }

    #[test]
    fn test_packet_tree_data_flattens_packet_fields() {
        let tree = PacketTree {
            packet: sample_packet(),
            days: vec![],
        };
        let value = serde_json::to_value(PacketTreeData::from(tree)).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["currencyCode"], "JPY");
        assert_eq!(value["itineraryDays"].as_array().unwrap().len(), 0);
        // Share state never leaks through the owner-facing packet shape.
        assert!(value.get("shareCode").is_none());
    }

    #[test]
    fn test_share_data_builds_share_url() {
        let share = ShareData::from_packet(&sample_packet(), "https://waypack.app").unwrap();
        assert_eq!(share.share_url, "https://waypack.app/shared/A2B3C4D5");
        assert_eq!(share.share_views, 3);
    }

    #[test]
    fn test_share_data_requires_active_code() {
        let mut packet = sample_packet();
        packet.share_code = None;
        assert!(ShareData::from_packet(&packet, "https://waypack.app").is_none());
    }

    #[test]
    fn test_share_request_accepts_known_types() {
        let request: ShareRequest = serde_json::from_str(r#"{"shareType": "free"}"#).unwrap();
        assert_eq!(request.share_type, ShareType::Free);
        assert!(serde_json::from_str::<ShareRequest>(r#"{"shareType": "premium"}"#).is_err());
    }
}
