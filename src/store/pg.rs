use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{ChildStateDelta, ChildStateStore, CommitOutcome, StoreError};
use crate::models::{Alert, AlertType, ChildRecord, ChildStatus, Priority};

// 告警列表缓存，写入时删除
const ALERT_CACHE_EXPIRE: u64 = 300;
const ALERT_CACHE_PREFIX: &str = "alerts:child:";

const CHILD_COLUMNS: &str = "id, parent_id, name, last_latitude, last_longitude, accuracy, \
                             current_zone, status, last_seen";

pub struct PgChildStateStore {
    pool: PgPool,
    redis: Arc<RedisClient>,
}

impl PgChildStateStore {
    pub fn new(pool: PgPool, redis: Arc<RedisClient>) -> Self {
        Self { pool, redis }
    }

    async fn invalidate_alert_cache(&self, child_id: &str) {
        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let cache_key = format!("{}{}", ALERT_CACHE_PREFIX, child_id);
            let _: Result<(), redis::RedisError> = conn.del(&cache_key).await;
        }
    }
}

fn child_from_row(row: &PgRow) -> Result<ChildRecord, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(ChildRecord {
        id: row.try_get("id")?,
        parent_id: row.try_get("parent_id")?,
        name: row.try_get("name")?,
        last_latitude: row.try_get("last_latitude")?,
        last_longitude: row.try_get("last_longitude")?,
        accuracy: row.try_get("accuracy")?,
        current_zone: row.try_get("current_zone")?,
        status: ChildStatus::from_str_lossy(&status),
        last_seen: row.try_get("last_seen")?,
    })
}

fn alert_from_row(row: &PgRow) -> Result<Alert, sqlx::Error> {
    let alert_type: String = row.try_get("type")?;
    let priority: String = row.try_get("priority")?;
    let actions: Option<String> = row.try_get("actions")?;
    Ok(Alert {
        id: row.try_get("id")?,
        child_id: row.try_get("child_id")?,
        alert_type: AlertType::from_str_lossy(&alert_type),
        message: row.try_get("message")?,
        priority: Priority::from_str_lossy(&priority),
        actions: actions
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default(),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl ChildStateStore for PgChildStateStore {
    async fn get(&self, child_id: &str) -> Result<ChildRecord, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE id = $1"
        ))
        .bind(child_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(child_from_row(&row)?),
            None => Err(StoreError::NotFound(child_id.to_string())),
        }
    }

    async fn get_for_parent(
        &self,
        child_id: &str,
        parent_id: &str,
    ) -> Result<ChildRecord, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE id = $1 AND parent_id = $2"
        ))
        .bind(child_id)
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(child_from_row(&row)?),
            None => Err(StoreError::NotFound(child_id.to_string())),
        }
    }

    async fn list_for_parent(&self, parent_id: &str) -> Result<Vec<ChildRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {CHILD_COLUMNS} FROM children WHERE parent_id = $1 ORDER BY name"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(child_from_row(row)?);
        }
        Ok(records)
    }

    async fn create(&self, parent_id: &str, name: &str) -> Result<ChildRecord, StoreError> {
        let child_id = Uuid::new_v4().to_string();
        let row = sqlx::query(&format!(
            "INSERT INTO children (id, parent_id, name, status) \
             VALUES ($1, $2, $3, $4) RETURNING {CHILD_COLUMNS}"
        ))
        .bind(&child_id)
        .bind(parent_id)
        .bind(name)
        .bind(ChildStatus::Unknown.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(child_from_row(&row)?)
    }

    async fn commit(
        &self,
        child_id: &str,
        delta: ChildStateDelta,
        new_alerts: Vec<Alert>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // last_seen 守卫：更旧的提交不会命中该行，行锁保证同一 child 串行
        let updated = sqlx::query(&format!(
            "UPDATE children SET last_latitude = $2, last_longitude = $3, accuracy = $4, \
             current_zone = $5, status = $6, last_seen = $7 \
             WHERE id = $1 AND (last_seen IS NULL OR last_seen <= $7) \
             RETURNING {CHILD_COLUMNS}"
        ))
        .bind(child_id)
        .bind(delta.latitude)
        .bind(delta.longitude)
        .bind(delta.accuracy)
        .bind(&delta.zone)
        .bind(delta.status.as_str())
        .bind(delta.observed_at)
        .fetch_optional(&mut *tx)
        .await?;

        let record = match updated {
            Some(row) => child_from_row(&row)?,
            None => {
                tx.rollback().await?;
                // 区分“提交过旧”与“child 不存在”
                let current = self.get(child_id).await?;
                return Ok(CommitOutcome {
                    record: current,
                    applied: false,
                });
            }
        };

        for alert in &new_alerts {
            let actions = serde_json::to_string(&alert.actions)
                .map_err(|e| StoreError::Persistence(e.to_string()))?;
            sqlx::query(
                "INSERT INTO alerts (id, child_id, type, message, priority, actions, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&alert.id)
            .bind(&alert.child_id)
            .bind(alert.alert_type.as_str())
            .bind(&alert.message)
            .bind(alert.priority.as_str())
            .bind(&actions)
            .bind(alert.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if !new_alerts.is_empty() {
            self.invalidate_alert_cache(child_id).await;
        }

        Ok(CommitOutcome {
            record,
            applied: true,
        })
    }

    async fn list_alerts(&self, child_id: &str) -> Result<Vec<Alert>, StoreError> {
        let cache_key = format!("{}{}", ALERT_CACHE_PREFIX, child_id);

        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            let cached: redis::RedisResult<String> = conn.get(&cache_key).await;
            if let Ok(json_str) = cached {
                if let Ok(alerts) = serde_json::from_str::<Vec<Alert>>(&json_str) {
                    tracing::debug!("Alert list served from cache: {}", cache_key);
                    return Ok(alerts);
                }
            }
        }

        let rows = sqlx::query(
            "SELECT id, child_id, type, message, priority, actions, created_at \
             FROM alerts WHERE child_id = $1 ORDER BY created_at DESC",
        )
        .bind(child_id)
        .fetch_all(&self.pool)
        .await?;

        let mut alerts = Vec::with_capacity(rows.len());
        for row in &rows {
            alerts.push(alert_from_row(row)?);
        }

        if let Ok(mut conn) = self.redis.get_multiplexed_async_connection().await {
            if let Ok(json_str) = serde_json::to_string(&alerts) {
                let _: Result<(), redis::RedisError> =
                    conn.set_ex(&cache_key, json_str, ALERT_CACHE_EXPIRE).await;
            }
        }

        Ok(alerts)
    }
}
