use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrowdDensity {
    Low,
    Medium,
    High,
}

impl CrowdDensity {
    /// 设备端既可能送字符串也可能送 0..1 数值，按三等分归一
    pub fn from_signal(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => match s.as_str() {
                "low" => Some(CrowdDensity::Low),
                "medium" => Some(CrowdDensity::Medium),
                "high" => Some(CrowdDensity::High),
                _ => None,
            },
            Value::Number(n) => {
                let n = n.as_f64()?;
                if n < 1.0 / 3.0 {
                    Some(CrowdDensity::Low)
                } else if n < 2.0 / 3.0 {
                    Some(CrowdDensity::Medium)
                } else {
                    Some(CrowdDensity::High)
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl From<RiskLevel> for Priority {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Low => Priority::Low,
            RiskLevel::Medium => Priority::Medium,
            RiskLevel::High => Priority::High,
        }
    }
}

/// 送往分析方的上下文，缺省字段不上送
#[derive(Debug, Clone, Serialize)]
pub struct SafetyContext {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_poi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poi_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crowd_density: Option<CrowdDensity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crime_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_familiar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_sensitivity: Option<Sensitivity>,
}

/// 分析方必须按该 schema 返回，多余字段视为违约
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyNarration {
    pub narrative_alert: String,
    pub risk_level: RiskLevel,
    pub recommended_action: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_exit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn narration_accepts_schema_conformant_payload() {
        let narration: SafetyNarration = serde_json::from_value(json!({
            "narrative_alert": "Crowded market, stay with a guardian",
            "risk_level": "medium",
            "recommended_action": ["Call Child"],
            "nearest_exit": "Gate 2"
        }))
        .unwrap();
        assert_eq!(narration.risk_level, RiskLevel::Medium);
        assert_eq!(narration.recommended_action, vec!["Call Child"]);
    }

    #[test]
    fn narration_rejects_unknown_risk_level() {
        let result: Result<SafetyNarration, _> = serde_json::from_value(json!({
            "narrative_alert": "x",
            "risk_level": "catastrophic",
            "recommended_action": []
        }));
        assert!(result.is_err());
    }

    #[test]
    fn narration_rejects_extra_keys() {
        let result: Result<SafetyNarration, _> = serde_json::from_value(json!({
            "narrative_alert": "x",
            "risk_level": "low",
            "recommended_action": [],
            "confidence": 0.9
        }));
        assert!(result.is_err());
    }

    #[test]
    fn crowd_density_accepts_strings_and_numbers() {
        assert_eq!(
            CrowdDensity::from_signal(&json!("high")),
            Some(CrowdDensity::High)
        );
        assert_eq!(
            CrowdDensity::from_signal(&json!(0.1)),
            Some(CrowdDensity::Low)
        );
        assert_eq!(
            CrowdDensity::from_signal(&json!(0.5)),
            Some(CrowdDensity::Medium)
        );
        assert_eq!(
            CrowdDensity::from_signal(&json!(0.9)),
            Some(CrowdDensity::High)
        );
        assert_eq!(CrowdDensity::from_signal(&json!("packed")), None);
        assert_eq!(CrowdDensity::from_signal(&json!(true)), None);
    }

    #[test]
    fn risk_level_maps_to_priority() {
        assert_eq!(Priority::from(RiskLevel::High), Priority::High);
        assert_eq!(Priority::from(RiskLevel::Low), Priority::Low);
    }

    #[test]
    fn context_skips_absent_signals() {
        let ctx = SafetyContext {
            latitude: 23.1,
            longitude: 76.9,
            floor: None,
            accuracy: None,
            nearest_poi: None,
            poi_type: None,
            crowd_density: None,
            crime_score: None,
            is_familiar: None,
            parent_sensitivity: None,
        };
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value.as_object().unwrap().len(), 2);
    }
}
