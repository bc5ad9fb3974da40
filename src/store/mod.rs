mod memory;
mod pg;

pub use memory::MemoryChildStateStore;
pub use pg::PgChildStateStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Alert, ChildRecord, ChildStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("child not found: {0}")]
    NotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            other => StoreError::Persistence(other.to_string()),
        }
    }
}

/// 一次位置提交要写入的字段，要么整体生效要么整体丢弃
#[derive(Debug, Clone)]
pub struct ChildStateDelta {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub zone: String,
    pub status: ChildStatus,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CommitOutcome {
    pub record: ChildRecord,
    /// false 表示该提交比已存储的 last_seen 更旧，被整体忽略
    pub applied: bool,
}

/// ChildRecord 位置字段的唯一写入方，同一 child 的提交串行化
#[async_trait]
pub trait ChildStateStore: Send + Sync {
    async fn get(&self, child_id: &str) -> Result<ChildRecord, StoreError>;

    async fn get_for_parent(
        &self,
        child_id: &str,
        parent_id: &str,
    ) -> Result<ChildRecord, StoreError>;

    async fn list_for_parent(&self, parent_id: &str) -> Result<Vec<ChildRecord>, StoreError>;

    async fn create(&self, parent_id: &str, name: &str) -> Result<ChildRecord, StoreError>;

    async fn commit(
        &self,
        child_id: &str,
        delta: ChildStateDelta,
        new_alerts: Vec<Alert>,
    ) -> Result<CommitOutcome, StoreError>;

    /// 全量告警历史，最新在前
    async fn list_alerts(&self, child_id: &str) -> Result<Vec<Alert>, StoreError>;
}
