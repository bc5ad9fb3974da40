use serde::{Deserialize, Serialize};

use crate::models::{Alert, ChildStatus};

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    #[serde(rename = "childId")]
    pub child_id: String,
}

/// 当前状态快照加全量告警历史，最新在前
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertListResponse {
    pub child_id: String,
    pub current_status: ChildStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub current_zone: Option<String>,
    pub alerts: Vec<Alert>,
}
