use chrono::{DateTime, Utc};

/// Packet row: one trip owned by one user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Packet {
    pub id: i32,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Decimal-as-string, stored exactly as submitted.
    pub cost: Option<String>,
    pub currency_code: String,
    pub share_code: Option<String>,
    pub share_type: String,
    pub share_enabled_at: Option<DateTime<Utc>>,
    pub share_views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Itinerary day row. `day_number` is the 1-based position the client last
/// submitted, never a client-supplied value.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItineraryDay {
    pub id: String,
    pub packet_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub day_number: i32,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Marker row. `packet_id` and `user_id` are denormalized from the owning
/// day so the whole tree can be loaded and deleted per packet.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Marker {
    pub id: String,
    pub day_id: String,
    pub packet_id: i32,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub lng: String,
    pub lat: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only log row for one public access of shared content.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PacketShareAccess {
    pub id: i32,
    pub packet_id: i32,
    pub share_code: String,
    pub visitor_ip: Option<String>,
    pub visitor_user_id: Option<String>,
    pub access_type: String,
    pub user_agent: Option<String>,
    pub accessed_at: DateTime<Utc>,
}

/// Mutable scalar fields of a packet, shared by create and update.
#[derive(Debug, Clone)]
pub struct PacketFields {
    pub name: String,
    pub description: Option<String>,
    pub cost: Option<String>,
    pub currency_code: Option<String>,
}

/// One day with its markers, both in stored order.
#[derive(Debug, Clone)]
pub struct DayWithMarkers {
    pub day: ItineraryDay,
    pub markers: Vec<Marker>,
}

/// A packet with its fully assembled itinerary tree.
#[derive(Debug, Clone)]
pub struct PacketTree {
    pub packet: Packet,
    pub days: Vec<DayWithMarkers>,
}
