//! Diff-and-upsert planning for itinerary trees.
//!
//! A client submits its full picture of a packet's itinerary. [`plan_update`]
//! compares that picture against what is persisted and produces an ordered
//! [`ReconcilePlan`]: markers to delete, days to delete, day writes, marker
//! writes. Executing the four lists in that order never violates the
//! marker→day or day→packet foreign keys, because children are removed
//! before their parents and parents are written before their children.

use std::collections::HashSet;

use uuid::Uuid;

use crate::itinerary::DayInput;

/// Persisted-side summary of one itinerary day: its id and the ids of its
/// markers. The planner needs nothing else about the stored tree.
#[derive(Debug, Clone)]
pub struct ExistingDay {
    pub id: String,
    pub marker_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
}

/// A day row to insert or overwrite.
#[derive(Debug, Clone)]
pub struct PlannedDay {
    pub op: WriteOp,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// 1-based position in the submitted array, regardless of any ordering
    /// the client sent.
    pub day_number: i32,
    pub sort_order: i32,
}

/// A marker row to insert or overwrite. `day_id` always points at the day
/// the marker was submitted under, so a marker moved between days is a
/// plain update.
#[derive(Debug, Clone)]
pub struct PlannedMarker {
    pub op: WriteOp,
    pub id: String,
    pub day_id: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub lng: String,
    pub lat: String,
    /// 0-based position within the parent day's submitted marker array.
    pub sort_order: i32,
}

/// Ordered write plan for one packet update.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub delete_marker_ids: Vec<String>,
    pub delete_day_ids: Vec<String>,
    pub days: Vec<PlannedDay>,
    pub markers: Vec<PlannedMarker>,
}

impl ReconcilePlan {
    /// True when executing the plan would touch no rows.
    pub fn is_empty(&self) -> bool {
        self.delete_marker_ids.is_empty()
            && self.delete_day_ids.is_empty()
            && self.days.is_empty()
            && self.markers.is_empty()
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// Plan the reconciliation of a submitted tree against the persisted one.
///
/// Submitted days keep their ids when present and get fresh ones otherwise;
/// the same goes for markers. Ordering fields are reassigned from array
/// position. Persisted rows whose ids the client omitted land in the
/// deletion lists.
pub fn plan_update(existing: &[ExistingDay], incoming: &[DayInput]) -> ReconcilePlan {
    let existing_day_ids: HashSet<&str> = existing.iter().map(|d| d.id.as_str()).collect();
    let existing_marker_ids: HashSet<&str> = existing
        .iter()
        .flat_map(|d| d.marker_ids.iter().map(String::as_str))
        .collect();

    let mut plan = ReconcilePlan::default();
    let mut incoming_day_ids: HashSet<String> = HashSet::new();
    let mut incoming_marker_ids: HashSet<String> = HashSet::new();

    for (day_index, day) in incoming.iter().enumerate() {
        let day_id = day.id.clone().unwrap_or_else(fresh_id);
        incoming_day_ids.insert(day_id.clone());

        let day_op = if existing_day_ids.contains(day_id.as_str()) {
            WriteOp::Update
        } else {
            WriteOp::Insert
        };
        plan.days.push(PlannedDay {
            op: day_op,
            id: day_id.clone(),
            name: day.day_text.clone(),
            description: day.description.clone(),
            day_number: day_index as i32 + 1,
            sort_order: day_index as i32,
        });

        for (marker_index, marker) in day.markers.iter().enumerate() {
            let marker_id = marker.id.clone().unwrap_or_else(fresh_id);
            incoming_marker_ids.insert(marker_id.clone());

            let marker_op = if existing_marker_ids.contains(marker_id.as_str()) {
                WriteOp::Update
            } else {
                WriteOp::Insert
            };
            plan.markers.push(PlannedMarker {
                op: marker_op,
                id: marker_id,
                day_id: day_id.clone(),
                title: marker.title.clone(),
                description: marker.description.clone(),
                kind: marker.kind.clone(),
                lng: marker.location.lng.clone(),
                lat: marker.location.lat.clone(),
                sort_order: marker_index as i32,
            });
        }
    }

    for day in existing {
        for marker_id in &day.marker_ids {
            if !incoming_marker_ids.contains(marker_id) {
                plan.delete_marker_ids.push(marker_id.clone());
            }
        }
    }
    for day in existing {
        if !incoming_day_ids.contains(&day.id) {
            plan.delete_day_ids.push(day.id.clone());
        }
    }

    plan
}

/// Plan the itinerary writes for a brand-new packet.
///
/// Every day and marker gets a freshly minted id even when the client sent
/// one, and there is nothing to delete.
pub fn plan_create(incoming: &[DayInput]) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for (day_index, day) in incoming.iter().enumerate() {
        let day_id = fresh_id();
        plan.days.push(PlannedDay {
            op: WriteOp::Insert,
            id: day_id.clone(),
            name: day.day_text.clone(),
            description: day.description.clone(),
            day_number: day_index as i32 + 1,
            sort_order: day_index as i32,
        });

        for (marker_index, marker) in day.markers.iter().enumerate() {
            plan.markers.push(PlannedMarker {
                op: WriteOp::Insert,
                id: fresh_id(),
                day_id: day_id.clone(),
                title: marker.title.clone(),
                description: marker.description.clone(),
                kind: marker.kind.clone(),
                lng: marker.location.lng.clone(),
                lat: marker.location.lat.clone(),
                sort_order: marker_index as i32,
            });
        }
    }

    plan
}
