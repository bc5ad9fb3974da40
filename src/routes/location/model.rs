use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ChildRecord, ChildStatus};

#[derive(Debug, Deserialize)]
pub struct ChildQuery {
    #[serde(rename = "childId")]
    pub child_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildLocationResponse {
    pub child_id: String,
    pub name: String,
    pub status: ChildStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub current_zone: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl From<ChildRecord> for ChildLocationResponse {
    fn from(record: ChildRecord) -> Self {
        Self {
            child_id: record.id,
            name: record.name,
            status: record.status,
            latitude: record.last_latitude,
            longitude: record.last_longitude,
            accuracy: record.accuracy,
            current_zone: record.current_zone,
            last_seen: record.last_seen,
        }
    }
}
