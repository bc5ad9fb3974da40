use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Location,
    Safety,
    SystemWarning,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Location => "location",
            AlertType::Safety => "safety",
            AlertType::SystemWarning => "system_warning",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "location" => AlertType::Location,
            "safety" => AlertType::Safety,
            _ => AlertType::SystemWarning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "high" => Priority::High,
            "medium" => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// 告警记录，只增不改，按时间倒序查询
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "childId")]
    pub child_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub priority: Priority,
    pub actions: Vec<String>,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        child_id: &str,
        alert_type: AlertType,
        priority: Priority,
        message: String,
        actions: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            child_id: child_id.to_string(),
            alert_type,
            message,
            priority,
            actions,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_wire_shape_matches_contract() {
        let alert = Alert::new(
            "c-1",
            AlertType::Safety,
            Priority::High,
            "Entered HIGH-RISK ZONE".to_string(),
            vec!["Call Child".to_string()],
        );
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "safety");
        assert_eq!(value["priority"], "high");
        assert_eq!(value["childId"], "c-1");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn alert_type_text_round_trip() {
        assert_eq!(AlertType::from_str_lossy("location"), AlertType::Location);
        assert_eq!(AlertType::from_str_lossy("junk"), AlertType::SystemWarning);
        assert_eq!(Priority::from_str_lossy("medium"), Priority::Medium);
        assert_eq!(Priority::from_str_lossy("junk"), Priority::Low);
    }
}
