use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 儿童当前状态，随每次位置提交更新
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildStatus {
    Safe,
    AtSchool,
    InUnfamiliarArea,
    InUnfamiliarAreaHighRisk,
    Unknown,
}

impl ChildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildStatus::Safe => "safe",
            ChildStatus::AtSchool => "at_school",
            ChildStatus::InUnfamiliarArea => "in_unfamiliar_area",
            ChildStatus::InUnfamiliarAreaHighRisk => "in_unfamiliar_area_high_risk",
            ChildStatus::Unknown => "unknown",
        }
    }

    /// 数据库中可能存在历史遗留的状态文本，无法识别时归为 unknown
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "safe" => ChildStatus::Safe,
            "at_school" => ChildStatus::AtSchool,
            "in_unfamiliar_area" => ChildStatus::InUnfamiliarArea,
            "in_unfamiliar_area_high_risk" => ChildStatus::InUnfamiliarAreaHighRisk,
            _ => ChildStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRecord {
    pub id: String,
    pub parent_id: String,
    pub name: String,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub current_zone: Option<String>,
    pub status: ChildStatus,
    pub last_seen: Option<DateTime<Utc>>,
}
