use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Alert, ChildRecord, ChildStatus};

#[derive(Debug, Clone, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// 推送给家长端的全量状态快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSnapshot {
    pub id: String,
    pub name: String,
    pub current_status: ChildStatus,
    pub location: String,
    pub coordinates: Coordinates,
    pub accuracy: f64,
    pub last_updated: Option<DateTime<Utc>>,
    pub alerts: Vec<Alert>,
}

impl ChildSnapshot {
    pub fn from_record(record: &ChildRecord, alerts: Vec<Alert>) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            current_status: record.status,
            location: record
                .current_zone
                .clone()
                .unwrap_or_else(|| "Unknown Location".to_string()),
            coordinates: Coordinates {
                lat: record.last_latitude.unwrap_or(0.0),
                lng: record.last_longitude.unwrap_or(0.0),
            },
            accuracy: record.accuracy.unwrap_or(9999.0),
            last_updated: record.last_seen,
            alerts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    #[serde(rename = "childUpdated")]
    ChildUpdated(ChildSnapshot),
    #[serde(rename = "newAlert")]
    NewAlert {
        #[serde(rename = "childId")]
        child_id: String,
        alert: Alert,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, Priority};

    fn record() -> ChildRecord {
        ChildRecord {
            id: "c-1".to_string(),
            parent_id: "p-1".to_string(),
            name: "Aarav".to_string(),
            last_latitude: Some(23.075),
            last_longitude: Some(76.855),
            accuracy: Some(8.0),
            current_zone: Some("Sehore".to_string()),
            status: ChildStatus::AtSchool,
            last_seen: Some(Utc::now()),
        }
    }

    #[test]
    fn child_updated_event_wire_shape() {
        let event = OutboundEvent::ChildUpdated(ChildSnapshot::from_record(&record(), vec![]));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "childUpdated");
        assert_eq!(value["id"], "c-1");
        assert_eq!(value["currentStatus"], "at_school");
        assert_eq!(value["location"], "Sehore");
        assert_eq!(value["coordinates"]["lat"], 23.075);
        assert!(value["alerts"].is_array());
    }

    #[test]
    fn new_alert_event_wire_shape() {
        let alert = Alert::new(
            "c-1",
            AlertType::Safety,
            Priority::High,
            "Entered HIGH-RISK ZONE".to_string(),
            vec!["Call Child".to_string()],
        );
        let event = OutboundEvent::NewAlert {
            child_id: "c-1".to_string(),
            alert,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "newAlert");
        assert_eq!(value["childId"], "c-1");
        assert_eq!(value["alert"]["priority"], "high");
    }

    #[test]
    fn snapshot_defaults_for_fresh_record() {
        let mut fresh = record();
        fresh.last_latitude = None;
        fresh.last_longitude = None;
        fresh.accuracy = None;
        fresh.current_zone = None;
        let snapshot = ChildSnapshot::from_record(&fresh, vec![]);
        assert_eq!(snapshot.coordinates.lat, 0.0);
        assert_eq!(snapshot.accuracy, 9999.0);
        assert_eq!(snapshot.location, "Unknown Location");
    }
}
