use crate::models::{Alert, AlertType, ChildStatus, Priority};

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat > self.min_lat && lat < self.max_lat && lon > self.min_lon && lon < self.max_lon
    }
}

/// 告警模板，message 中的 {lat}/{lon} 渲染为四位小数
#[derive(Debug, Clone)]
pub struct AlertTemplate {
    pub alert_type: AlertType,
    pub priority: Priority,
    pub message: String,
    pub actions: Vec<String>,
}

impl AlertTemplate {
    fn render(&self, child_id: &str, lat: f64, lon: f64) -> Alert {
        let message = self
            .message
            .replace("{lat}", &format!("{:.4}", lat))
            .replace("{lon}", &format!("{:.4}", lon));
        Alert::new(
            child_id,
            self.alert_type,
            self.priority,
            message,
            self.actions.clone(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct GeofenceRule {
    pub name: &'static str,
    /// None 表示对所有 child 生效
    pub child_id: Option<String>,
    pub bounds: BoundingBox,
    pub status: ChildStatus,
    pub alert: AlertTemplate,
}

impl GeofenceRule {
    fn matches(&self, child_id: &str, lat: f64, lon: f64) -> bool {
        if let Some(bound_child) = &self.child_id {
            if bound_child != child_id {
                return false;
            }
        }
        self.bounds.contains(lat, lon)
    }
}

/// 纯函数求值器：无 I/O，相同输入必得相同输出。
/// 状态转移取第一条命中的规则，告警由每条命中的规则各自贡献。
pub struct GeofenceEvaluator {
    rules: Vec<GeofenceRule>,
}

impl GeofenceEvaluator {
    pub fn new(rules: Vec<GeofenceRule>) -> Self {
        Self { rules }
    }

    pub fn with_default_rules() -> Self {
        Self::new(default_rules())
    }

    pub fn evaluate(
        &self,
        child_id: &str,
        lat: f64,
        lon: f64,
        prior_status: ChildStatus,
    ) -> (ChildStatus, Vec<Alert>) {
        let mut status = prior_status;
        let mut status_decided = false;
        let mut alerts = Vec::new();

        for rule in &self.rules {
            if !rule.matches(child_id, lat, lon) {
                continue;
            }
            if !status_decided {
                status = rule.status;
                status_decided = true;
            }
            alerts.push(rule.alert.render(child_id, lat, lon));
        }

        (status, alerts)
    }
}

/// 生产环境的两条固定围栏，按优先级排列
pub fn default_rules() -> Vec<GeofenceRule> {
    vec![
        GeofenceRule {
            name: "school",
            child_id: None,
            bounds: BoundingBox {
                min_lat: 23.07,
                max_lat: 23.08,
                min_lon: 76.85,
                max_lon: 76.86,
            },
            status: ChildStatus::AtSchool,
            alert: AlertTemplate {
                alert_type: AlertType::Location,
                priority: Priority::Low,
                message: "Arrived at school premises (Live Detected)".to_string(),
                actions: vec![],
            },
        },
        GeofenceRule {
            name: "high_risk_zone",
            child_id: None,
            bounds: BoundingBox {
                min_lat: 23.1,
                max_lat: 23.2,
                min_lon: 76.9,
                max_lon: 77.0,
            },
            status: ChildStatus::InUnfamiliarAreaHighRisk,
            alert: AlertTemplate {
                alert_type: AlertType::Safety,
                priority: Priority::High,
                message: "Entered HIGH-RISK ZONE near ({lat}, {lon}) (Live Detected)!"
                    .to_string(),
                actions: vec![
                    "Call Child".to_string(),
                    "Send Safety Prompt".to_string(),
                    "Contact Authorities".to_string(),
                ],
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_box_sets_at_school_with_low_location_alert() {
        let evaluator = GeofenceEvaluator::with_default_rules();
        let (status, alerts) = evaluator.evaluate("c1", 23.075, 76.855, ChildStatus::Safe);

        assert_eq!(status, ChildStatus::AtSchool);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Location);
        assert_eq!(alerts[0].priority, Priority::Low);
        assert_eq!(alerts[0].message, "Arrived at school premises (Live Detected)");
        assert!(alerts[0].actions.is_empty());
    }

    #[test]
    fn high_risk_box_sets_high_risk_status_with_actions() {
        let evaluator = GeofenceEvaluator::with_default_rules();
        let (status, alerts) = evaluator.evaluate("c1", 23.15, 76.95, ChildStatus::AtSchool);

        assert_eq!(status, ChildStatus::InUnfamiliarAreaHighRisk);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::Safety);
        assert_eq!(alerts[0].priority, Priority::High);
        assert_eq!(
            alerts[0].message,
            "Entered HIGH-RISK ZONE near (23.1500, 76.9500) (Live Detected)!"
        );
        assert_eq!(
            alerts[0].actions,
            vec!["Call Child", "Send Safety Prompt", "Contact Authorities"]
        );
    }

    #[test]
    fn no_match_keeps_prior_status_and_no_alerts() {
        let evaluator = GeofenceEvaluator::with_default_rules();
        let (status, alerts) = evaluator.evaluate("c1", 0.0, 0.0, ChildStatus::Safe);
        assert_eq!(status, ChildStatus::Safe);
        assert!(alerts.is_empty());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let evaluator = GeofenceEvaluator::with_default_rules();
        let (s1, a1) = evaluator.evaluate("c1", 23.15, 76.95, ChildStatus::Safe);
        let (s2, a2) = evaluator.evaluate("c1", 23.15, 76.95, ChildStatus::Safe);
        assert_eq!(s1, s2);
        assert_eq!(a1.len(), a2.len());
        assert_eq!(a1[0].message, a2[0].message);
        assert_eq!(a1[0].actions, a2[0].actions);
    }

    #[test]
    fn child_bound_rule_ignores_other_children() {
        let mut rules = default_rules();
        rules[0].child_id = Some("only-this-child".to_string());
        let evaluator = GeofenceEvaluator::new(rules);

        let (status, alerts) = evaluator.evaluate("someone-else", 23.075, 76.855, ChildStatus::Safe);
        assert_eq!(status, ChildStatus::Safe);
        assert!(alerts.is_empty());

        let (status, _) = evaluator.evaluate("only-this-child", 23.075, 76.855, ChildStatus::Safe);
        assert_eq!(status, ChildStatus::AtSchool);
    }

    #[test]
    fn first_match_wins_status_but_every_match_contributes_alerts() {
        let overlapping = vec![
            GeofenceRule {
                name: "outer",
                child_id: None,
                bounds: BoundingBox {
                    min_lat: 0.0,
                    max_lat: 10.0,
                    min_lon: 0.0,
                    max_lon: 10.0,
                },
                status: ChildStatus::InUnfamiliarArea,
                alert: AlertTemplate {
                    alert_type: AlertType::Location,
                    priority: Priority::Medium,
                    message: "outer".to_string(),
                    actions: vec![],
                },
            },
            GeofenceRule {
                name: "inner",
                child_id: None,
                bounds: BoundingBox {
                    min_lat: 4.0,
                    max_lat: 6.0,
                    min_lon: 4.0,
                    max_lon: 6.0,
                },
                status: ChildStatus::InUnfamiliarAreaHighRisk,
                alert: AlertTemplate {
                    alert_type: AlertType::Safety,
                    priority: Priority::High,
                    message: "inner".to_string(),
                    actions: vec![],
                },
            },
        ];
        let evaluator = GeofenceEvaluator::new(overlapping);

        let (status, alerts) = evaluator.evaluate("c1", 5.0, 5.0, ChildStatus::Safe);
        // 状态由排在前面的规则决定，两条规则都贡献告警
        assert_eq!(status, ChildStatus::InUnfamiliarArea);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].message, "outer");
        assert_eq!(alerts[1].message, "inner");
    }
}
