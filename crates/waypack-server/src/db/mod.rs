pub mod models;

use std::collections::HashMap;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use waypack_core::reconcile::{self, ExistingDay, ReconcilePlan, WriteOp};
use waypack_core::share::{self, ShareType};
use waypack_core::DayInput;

use crate::error::AppError;
use models::{
    DayWithMarkers, ItineraryDay, Marker, Packet, PacketFields, PacketShareAccess, PacketTree,
};

/// Attempts to draw a globally unique share code before giving up.
const SHARE_CODE_ATTEMPTS: u32 = 10;

/// How many recent access-log rows the share stats endpoint returns.
const SHARE_STATS_RECENT_LIMIT: i64 = 10;

const PACKET_COLUMNS: &str = "id, user_id, name, description, cost, currency_code, \
     share_code, share_type, share_enabled_at, share_views, created_at, updated_at";

/// Visitor details captured on the public share path.
#[derive(Debug, Clone, Default)]
pub struct Visitor {
    pub ip: Option<String>,
    pub user_id: Option<String>,
    pub user_agent: Option<String>,
}

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// All packets owned by the user, newest first.
    pub async fn list_packets(&self, user_id: &str) -> Result<Vec<Packet>, AppError> {
        let packets = sqlx::query_as::<_, Packet>(&format!(
            "SELECT {PACKET_COLUMNS} FROM packet WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(packets)
    }

    /// Insert a packet and its itinerary tree in one transaction. Every day
    /// and marker gets a freshly minted id.
    pub async fn create_packet(
        &self,
        user_id: &str,
        fields: &PacketFields,
        itinerary: &[DayInput],
    ) -> Result<PacketTree, AppError> {
        let plan = reconcile::plan_create(itinerary);

        let mut tx = self.pool.begin().await?;

        let packet = sqlx::query_as::<_, Packet>(&format!(
            "INSERT INTO packet (user_id, name, description, cost, currency_code) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PACKET_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.cost)
        .bind(fields.currency_code.as_deref().unwrap_or("USD"))
        .fetch_one(&mut *tx)
        .await?;

        apply_plan(&mut tx, packet.id, user_id, &plan).await?;

        let days = fetch_days(&mut *tx, packet.id).await?;
        let markers = fetch_markers(&mut *tx, packet.id).await?;
        tx.commit().await?;

        Ok(assemble_tree(packet, days, markers))
    }

    /// The packet with its assembled tree, or None when it does not exist
    /// or belongs to someone else.
    pub async fn get_packet_tree(
        &self,
        user_id: &str,
        packet_id: i32,
    ) -> Result<Option<PacketTree>, AppError> {
        let Some(packet) = fetch_packet_for_owner(&self.pool, packet_id, user_id).await? else {
            return Ok(None);
        };
        let days = fetch_days(&self.pool, packet.id).await?;
        let markers = fetch_markers(&self.pool, packet.id).await?;

        Ok(Some(assemble_tree(packet, days, markers)))
    }

    /// Overwrite the packet's scalar fields and reconcile its itinerary tree
    /// against the submitted one, all inside one transaction. Returns None
    /// (and rolls back) when the packet is absent or not owned by the caller.
    pub async fn update_packet(
        &self,
        user_id: &str,
        packet_id: i32,
        fields: &PacketFields,
        itinerary: &[DayInput],
    ) -> Result<Option<PacketTree>, AppError> {
        let mut tx = self.pool.begin().await?;

        if fetch_packet_for_owner(&mut *tx, packet_id, user_id)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let packet = sqlx::query_as::<_, Packet>(&format!(
            "UPDATE packet \
             SET name = $1, description = $2, cost = $3, currency_code = $4, updated_at = NOW() \
             WHERE id = $5 \
             RETURNING {PACKET_COLUMNS}"
        ))
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(&fields.cost)
        .bind(fields.currency_code.as_deref().unwrap_or("USD"))
        .bind(packet_id)
        .fetch_one(&mut *tx)
        .await?;

        let existing_days = fetch_days(&mut *tx, packet_id).await?;
        let existing_markers = fetch_markers(&mut *tx, packet_id).await?;
        let existing: Vec<ExistingDay> = existing_days
            .iter()
            .map(|day| ExistingDay {
                id: day.id.clone(),
                marker_ids: existing_markers
                    .iter()
                    .filter(|m| m.day_id == day.id)
                    .map(|m| m.id.clone())
                    .collect(),
            })
            .collect();

        let plan = reconcile::plan_update(&existing, itinerary);
        apply_plan(&mut tx, packet_id, user_id, &plan).await?;

        let days = fetch_days(&mut *tx, packet_id).await?;
        let markers = fetch_markers(&mut *tx, packet_id).await?;
        tx.commit().await?;

        Ok(Some(assemble_tree(packet, days, markers)))
    }

    /// Delete the packet and its whole tree, markers first, then days, then
    /// the packet row. Returns false when there was nothing the caller owns.
    pub async fn delete_packet(&self, user_id: &str, packet_id: i32) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        if fetch_packet_for_owner(&mut *tx, packet_id, user_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        sqlx::query("DELETE FROM marker WHERE packet_id = $1")
            .bind(packet_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM itinerary_day WHERE packet_id = $1")
            .bind(packet_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM packet WHERE id = $1")
            .bind(packet_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Turn on sharing with a freshly allocated share code and a reset view
    /// counter. Returns None when the packet is absent or foreign.
    pub async fn enable_sharing(
        &self,
        user_id: &str,
        packet_id: i32,
        share_type: ShareType,
    ) -> Result<Option<Packet>, AppError> {
        let mut tx = self.pool.begin().await?;

        if fetch_packet_for_owner(&mut *tx, packet_id, user_id)
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let code = allocate_share_code(&mut tx).await?;

        let packet = sqlx::query_as::<_, Packet>(&format!(
            "UPDATE packet \
             SET share_code = $1, share_type = $2, share_enabled_at = NOW(), share_views = 0 \
             WHERE id = $3 \
             RETURNING {PACKET_COLUMNS}"
        ))
        .bind(&code)
        .bind(share_type.as_str())
        .bind(packet_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(packet))
    }

    /// Turn off sharing. The old code is gone for good; re-enabling draws a
    /// new one.
    pub async fn disable_sharing(
        &self,
        user_id: &str,
        packet_id: i32,
    ) -> Result<Option<Packet>, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(packet) = fetch_packet_for_owner(&mut *tx, packet_id, user_id).await? else {
            return Ok(None);
        };
        if packet.share_code.is_none() {
            return Err(AppError::BadRequest(
                "Packet is not currently shared".to_string(),
            ));
        }

        let packet = sqlx::query_as::<_, Packet>(&format!(
            "UPDATE packet \
             SET share_code = NULL, share_type = 'private', share_enabled_at = NULL \
             WHERE id = $1 \
             RETURNING {PACKET_COLUMNS}"
        ))
        .bind(packet_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(packet))
    }

    /// Share metadata plus the most recent access-log rows, newest first.
    pub async fn share_stats(
        &self,
        user_id: &str,
        packet_id: i32,
    ) -> Result<Option<(Packet, Vec<PacketShareAccess>)>, AppError> {
        let Some(packet) = fetch_packet_for_owner(&self.pool, packet_id, user_id).await? else {
            return Ok(None);
        };
        if packet.share_code.is_none() {
            return Err(AppError::BadRequest(
                "Packet is not currently shared".to_string(),
            ));
        }

        let recent = sqlx::query_as::<_, PacketShareAccess>(
            "SELECT id, packet_id, share_code, visitor_ip, visitor_user_id, access_type, \
                    user_agent, accessed_at \
             FROM packet_share_access \
             WHERE packet_id = $1 \
             ORDER BY accessed_at DESC \
             LIMIT $2",
        )
        .bind(packet_id)
        .bind(SHARE_STATS_RECENT_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((packet, recent)))
    }

    /// Public share-code lookup. No ownership filter here: the code is the
    /// capability. Disabled or private sharing is reported exactly like a
    /// code that never existed. A free share counts the view and appends an
    /// access-log row in the same transaction that reads the tree.
    pub async fn get_shared_content(
        &self,
        share_code: &str,
        visitor: &Visitor,
    ) -> Result<Option<PacketTree>, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(mut packet) = sqlx::query_as::<_, Packet>(&format!(
            "SELECT {PACKET_COLUMNS} FROM packet WHERE share_code = $1"
        ))
        .bind(share_code)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        match packet.share_type.parse::<ShareType>() {
            Ok(ShareType::Free) => {}
            Ok(ShareType::Paid) => {
                return Err(AppError::Unimplemented(
                    "Paid sharing not yet implemented".to_string(),
                ))
            }
            Ok(ShareType::Private) | Err(_) => return Ok(None),
        }

        let days = fetch_days(&mut *tx, packet.id).await?;
        let markers = fetch_markers(&mut *tx, packet.id).await?;

        let (views,): (i32,) = sqlx::query_as(
            "UPDATE packet SET share_views = share_views + 1 WHERE id = $1 RETURNING share_views",
        )
        .bind(packet.id)
        .fetch_one(&mut *tx)
        .await?;
        packet.share_views = views;

        sqlx::query(
            "INSERT INTO packet_share_access \
                 (packet_id, share_code, visitor_ip, visitor_user_id, access_type, user_agent) \
             VALUES ($1, $2, $3, $4, 'view', $5)",
        )
        .bind(packet.id)
        .bind(share_code)
        .bind(&visitor.ip)
        .bind(&visitor.user_id)
        .bind(&visitor.user_agent)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(assemble_tree(packet, days, markers)))
    }
}

async fn fetch_packet_for_owner<'e, E>(
    executor: E,
    packet_id: i32,
    user_id: &str,
) -> Result<Option<Packet>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Packet>(&format!(
        "SELECT {PACKET_COLUMNS} FROM packet WHERE id = $1 AND user_id = $2"
    ))
    .bind(packet_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

async fn fetch_days<'e, E>(executor: E, packet_id: i32) -> Result<Vec<ItineraryDay>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, ItineraryDay>(
        "SELECT id, packet_id, name, description, day_number, sort_order, created_at, updated_at \
         FROM itinerary_day \
         WHERE packet_id = $1 \
         ORDER BY day_number ASC",
    )
    .bind(packet_id)
    .fetch_all(executor)
    .await
}

async fn fetch_markers<'e, E>(executor: E, packet_id: i32) -> Result<Vec<Marker>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, Marker>(
        "SELECT id, day_id, packet_id, user_id, title, description, kind, lng, lat, sort_order, \
                created_at, updated_at \
         FROM marker \
         WHERE packet_id = $1 \
         ORDER BY sort_order ASC",
    )
    .bind(packet_id)
    .fetch_all(executor)
    .await
}

/// Execute a reconciliation plan: marker deletes, day deletes, day writes,
/// marker writes. The order keeps the marker→day and day→packet foreign
/// keys satisfied at every step.
async fn apply_plan(
    tx: &mut Transaction<'_, Postgres>,
    packet_id: i32,
    user_id: &str,
    plan: &ReconcilePlan,
) -> Result<(), AppError> {
    if !plan.delete_marker_ids.is_empty() {
        sqlx::query("DELETE FROM marker WHERE id = ANY($1)")
            .bind(&plan.delete_marker_ids)
            .execute(&mut **tx)
            .await?;
    }
    if !plan.delete_day_ids.is_empty() {
        sqlx::query("DELETE FROM itinerary_day WHERE id = ANY($1)")
            .bind(&plan.delete_day_ids)
            .execute(&mut **tx)
            .await?;
    }

    for day in &plan.days {
        match day.op {
            WriteOp::Insert => {
                sqlx::query(
                    "INSERT INTO itinerary_day \
                         (id, packet_id, name, description, day_number, sort_order) \
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(&day.id)
                .bind(packet_id)
                .bind(&day.name)
                .bind(&day.description)
                .bind(day.day_number)
                .bind(day.sort_order)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::Update => {
                sqlx::query(
                    "UPDATE itinerary_day \
                     SET name = $1, description = $2, day_number = $3, sort_order = $4, \
                         updated_at = NOW() \
                     WHERE id = $5",
                )
                .bind(&day.name)
                .bind(&day.description)
                .bind(day.day_number)
                .bind(day.sort_order)
                .bind(&day.id)
                .execute(&mut **tx)
                .await?;
            }
        }
    }

    for marker in &plan.markers {
        match marker.op {
            WriteOp::Insert => {
                sqlx::query(
                    "INSERT INTO marker \
                         (id, day_id, packet_id, user_id, title, description, kind, lng, lat, \
                          sort_order) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                )
                .bind(&marker.id)
                .bind(&marker.day_id)
                .bind(packet_id)
                .bind(user_id)
                .bind(&marker.title)
                .bind(&marker.description)
                .bind(&marker.kind)
                .bind(&marker.lng)
                .bind(&marker.lat)
                .bind(marker.sort_order)
                .execute(&mut **tx)
                .await?;
            }
            WriteOp::Update => {
                sqlx::query(
                    "UPDATE marker \
                     SET day_id = $1, title = $2, description = $3, kind = $4, lng = $5, \
                         lat = $6, sort_order = $7, updated_at = NOW() \
                     WHERE id = $8",
                )
                .bind(&marker.day_id)
                .bind(&marker.title)
                .bind(&marker.description)
                .bind(&marker.kind)
                .bind(&marker.lng)
                .bind(&marker.lat)
                .bind(marker.sort_order)
                .bind(&marker.id)
                .execute(&mut **tx)
                .await?;
            }
        }
    }

    Ok(())
}

/// Draw share codes until one is globally unused, bounded by
/// [`SHARE_CODE_ATTEMPTS`]. The UNIQUE constraint on packet.share_code
/// still backs this up if two enables race past the check.
async fn allocate_share_code(tx: &mut Transaction<'_, Postgres>) -> Result<String, AppError> {
    for _ in 0..SHARE_CODE_ATTEMPTS {
        let code = share::generate_share_code(&mut rand::thread_rng());
        let (taken,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM packet WHERE share_code = $1)")
                .bind(&code)
                .fetch_one(&mut **tx)
                .await?;
        if !taken {
            return Ok(code);
        }
    }
    Err(AppError::ShareCodeExhausted(SHARE_CODE_ATTEMPTS))
}

/// Re-nest markers under their days. Both inputs arrive ordered, so the
/// per-day vectors come out in sort_order as well.
fn assemble_tree(packet: Packet, days: Vec<ItineraryDay>, markers: Vec<Marker>) -> PacketTree {
    let mut by_day: HashMap<String, Vec<Marker>> = HashMap::new();
    for marker in markers {
        by_day.entry(marker.day_id.clone()).or_default().push(marker);
    }

    let days = days
        .into_iter()
        .map(|day| {
            let markers = by_day.remove(&day.id).unwrap_or_default();
            DayWithMarkers { day, markers }
        })
        .collect();

    PacketTree { packet, days }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn packet() -> Packet {
        Packet {
            id: 1,
            user_id: "user-1".to_string(),
            name: "Tokyo Trip".to_string(),
            description: None,
            cost: None,
            currency_code: "USD".to_string(),
            share_code: None,
            share_type: "private".to_string(),
            share_enabled_at: None,
            share_views: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(id: &str, day_number: i32) -> ItineraryDay {
        ItineraryDay {
            id: id.to_string(),
            packet_id: 1,
            name: format!("Day {day_number}"),
            description: None,
            day_number,
            sort_order: day_number - 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn marker(id: &str, day_id: &str, sort_order: i32) -> Marker {
        Marker {
            id: id.to_string(),
            day_id: day_id.to_string(),
            packet_id: 1,
            user_id: "user-1".to_string(),
            title: id.to_string(),
            description: None,
            kind: None,
            lng: "139.70".to_string(),
            lat: "35.65".to_string(),
            sort_order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_tree_groups_markers_under_days() {
        let days = vec![day("d-1", 1), day("d-2", 2)];
        let markers = vec![
            marker("m-1", "d-1", 0),
            marker("m-2", "d-1", 1),
            marker("m-3", "d-2", 0),
        ];

        let tree = assemble_tree(packet(), days, markers);

        assert_eq!(tree.days.len(), 2);
        assert_eq!(tree.days[0].markers.len(), 2);
        assert_eq!(tree.days[0].markers[0].id, "m-1");
        assert_eq!(tree.days[0].markers[1].id, "m-2");
        assert_eq!(tree.days[1].markers.len(), 1);
        assert_eq!(tree.days[1].markers[0].id, "m-3");
    }

    #[test]
    fn test_assemble_tree_day_without_markers() {
        let tree = assemble_tree(packet(), vec![day("d-1", 1)], vec![]);
        assert_eq!(tree.days.len(), 1);
        assert!(tree.days[0].markers.is_empty());
    }
}
