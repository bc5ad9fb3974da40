use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

/// 家长告警偏好；缺省为中等敏感度、45 秒告警间隔
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Settings {
    pub risk_sensitivity: i32,
    pub alert_frequency: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            risk_sensitivity: 2,
            alert_frequency: 45,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub risk_sensitivity: i32,
    pub alert_frequency: i32,
}

impl Settings {
    /// 没有落库过配置的家长拿到缺省值
    pub async fn fetch(pool: &PgPool, parent_id: &str) -> Result<Self, sqlx::Error> {
        let settings = sqlx::query_as::<_, Settings>(
            r#"
            SELECT risk_sensitivity, alert_frequency
            FROM parents_config_settings
            WHERE parent_id = $1
            "#,
        )
        .bind(parent_id)
        .fetch_optional(pool)
        .await?;
        Ok(settings.unwrap_or_default())
    }

    pub async fn upsert(
        pool: &PgPool,
        parent_id: &str,
        req: &UpdateSettingsRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Settings>(
            r#"
            INSERT INTO parents_config_settings (parent_id, risk_sensitivity, alert_frequency)
            VALUES ($1, $2, $3)
            ON CONFLICT (parent_id)
            DO UPDATE SET risk_sensitivity = $2, alert_frequency = $3
            RETURNING risk_sensitivity, alert_frequency
            "#,
        )
        .bind(parent_id)
        .bind(req.risk_sensitivity)
        .bind(req.alert_frequency)
        .fetch_one(pool)
        .await
    }
}
