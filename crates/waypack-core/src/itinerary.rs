use serde::{Deserialize, Serialize};

/// Geo coordinates, kept as decimal strings exactly as the client sends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub lng: String,
    pub lat: String,
}

/// One marker of a submitted itinerary tree.
///
/// A present `id` refers to an already-persisted marker; an absent one asks
/// the backend to mint a fresh identifier. Any client-sent ordering is
/// ignored: a marker's position in its parent's `markers` array is
/// authoritative.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerInput {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Free-text category tag ("food", "museum", ...).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub location: Location,
}

/// One day of a submitted itinerary tree, markers in display order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayInput {
    #[serde(default)]
    pub id: Option<String>,
    /// Display name of the day. Accepts `name` as well so a tree fetched
    /// from the read path can be resubmitted unchanged.
    #[serde(alias = "name")]
    pub day_text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub markers: Vec<MarkerInput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_input_from_json() {
        let json = r#"{
            "dayText": "Day 1",
            "description": "Arrival",
            "markers": [
                {"title": "Shibuya Crossing", "type": "sight",
                 "location": {"lng": "139.7004", "lat": "35.6595"}}
            ]
        }"#;
        let day: DayInput = serde_json::from_str(json).unwrap();
        assert_eq!(day.id, None);
        assert_eq!(day.day_text, "Day 1");
        assert_eq!(day.markers.len(), 1);
        assert_eq!(day.markers[0].kind.as_deref(), Some("sight"));
        assert_eq!(day.markers[0].location.lng, "139.7004");
    }

    #[test]
    fn test_day_input_accepts_name_alias() {
        // Trees returned by the read path carry `name`, not `dayText`.
        let json = r#"{"id": "d-1", "name": "Day 1", "markers": []}"#;
        let day: DayInput = serde_json::from_str(json).unwrap();
        assert_eq!(day.id.as_deref(), Some("d-1"));
        assert_eq!(day.day_text, "Day 1");
        assert!(day.markers.is_empty());
    }

    #[test]
    fn test_marker_input_optional_fields() {
        let json = r#"{"title": "Lunch", "location": {"lng": "2.35", "lat": "48.85"}}"#;
        let marker: MarkerInput = serde_json::from_str(json).unwrap();
        assert_eq!(marker.id, None);
        assert_eq!(marker.description, None);
        assert_eq!(marker.kind, None);
    }
}
