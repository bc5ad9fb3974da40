use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{ChildStateDelta, ChildStateStore, CommitOutcome, StoreError};
use crate::models::{Alert, ChildRecord, ChildStatus};

#[derive(Debug)]
struct ChildEntry {
    record: ChildRecord,
    alerts: Vec<Alert>,
}

/// 内存实现，per-child 互斥锁保证同一 child 的提交串行化
#[derive(Default)]
pub struct MemoryChildStateStore {
    children: RwLock<HashMap<String, Arc<Mutex<ChildEntry>>>>,
}

impl MemoryChildStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, child_id: &str) -> Result<Arc<Mutex<ChildEntry>>, StoreError> {
        self.children
            .read()
            .await
            .get(child_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(child_id.to_string()))
    }
}

#[async_trait]
impl ChildStateStore for MemoryChildStateStore {
    async fn get(&self, child_id: &str) -> Result<ChildRecord, StoreError> {
        let entry = self.entry(child_id).await?;
        let guard = entry.lock().await;
        Ok(guard.record.clone())
    }

    async fn get_for_parent(
        &self,
        child_id: &str,
        parent_id: &str,
    ) -> Result<ChildRecord, StoreError> {
        let record = self.get(child_id).await?;
        if record.parent_id != parent_id {
            return Err(StoreError::NotFound(child_id.to_string()));
        }
        Ok(record)
    }

    async fn list_for_parent(&self, parent_id: &str) -> Result<Vec<ChildRecord>, StoreError> {
        let map = self.children.read().await;
        let mut records = Vec::new();
        for entry in map.values() {
            let guard = entry.lock().await;
            if guard.record.parent_id == parent_id {
                records.push(guard.record.clone());
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn create(&self, parent_id: &str, name: &str) -> Result<ChildRecord, StoreError> {
        let record = ChildRecord {
            id: Uuid::new_v4().to_string(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            last_latitude: None,
            last_longitude: None,
            accuracy: None,
            current_zone: None,
            status: ChildStatus::Unknown,
            last_seen: None,
        };
        let entry = Arc::new(Mutex::new(ChildEntry {
            record: record.clone(),
            alerts: Vec::new(),
        }));
        self.children
            .write()
            .await
            .insert(record.id.clone(), entry);
        Ok(record)
    }

    async fn commit(
        &self,
        child_id: &str,
        delta: ChildStateDelta,
        new_alerts: Vec<Alert>,
    ) -> Result<CommitOutcome, StoreError> {
        let entry = self.entry(child_id).await?;
        let mut guard = entry.lock().await;

        // 比已存储时间更旧的提交整体忽略，杜绝字段撕裂
        if let Some(seen) = guard.record.last_seen {
            if delta.observed_at < seen {
                return Ok(CommitOutcome {
                    record: guard.record.clone(),
                    applied: false,
                });
            }
        }

        guard.record.last_latitude = Some(delta.latitude);
        guard.record.last_longitude = Some(delta.longitude);
        guard.record.accuracy = delta.accuracy;
        guard.record.current_zone = Some(delta.zone);
        guard.record.status = delta.status;
        guard.record.last_seen = Some(delta.observed_at);
        guard.alerts.extend(new_alerts);

        Ok(CommitOutcome {
            record: guard.record.clone(),
            applied: true,
        })
    }

    async fn list_alerts(&self, child_id: &str) -> Result<Vec<Alert>, StoreError> {
        let entry = self.entry(child_id).await?;
        let guard = entry.lock().await;
        let mut alerts = guard.alerts.clone();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertType, Priority};
    use chrono::{Duration, Utc};

    fn delta(observed_at: chrono::DateTime<Utc>, lat: f64, zone: &str) -> ChildStateDelta {
        ChildStateDelta {
            latitude: lat,
            longitude: 76.9,
            accuracy: Some(12.0),
            zone: zone.to_string(),
            status: ChildStatus::Safe,
            observed_at,
        }
    }

    #[tokio::test]
    async fn commit_moves_all_fields_together() {
        let store = MemoryChildStateStore::new();
        let child = store.create("p-1", "Aarav").await.unwrap();

        let now = Utc::now();
        let outcome = store
            .commit(&child.id, delta(now, 23.07, "Sehore"), vec![])
            .await
            .unwrap();

        assert!(outcome.applied);
        assert_eq!(outcome.record.last_latitude, Some(23.07));
        assert_eq!(outcome.record.current_zone.as_deref(), Some("Sehore"));
        assert_eq!(outcome.record.last_seen, Some(now));
    }

    #[tokio::test]
    async fn stale_commit_is_ignored_whole() {
        let store = MemoryChildStateStore::new();
        let child = store.create("p-1", "Aarav").await.unwrap();

        let t2 = Utc::now();
        let t1 = t2 - Duration::seconds(30);

        store
            .commit(&child.id, delta(t2, 23.15, "Bhopal"), vec![])
            .await
            .unwrap();
        let stale = store
            .commit(
                &child.id,
                delta(t1, 23.07, "Sehore"),
                vec![Alert::new(
                    &child.id,
                    AlertType::Location,
                    Priority::Low,
                    "late".to_string(),
                    vec![],
                )],
            )
            .await
            .unwrap();

        assert!(!stale.applied);
        // T2 的数据完整保留，不会混入 T1 的任何字段或告警
        assert_eq!(stale.record.last_latitude, Some(23.15));
        assert_eq!(stale.record.current_zone.as_deref(), Some("Bhopal"));
        assert_eq!(stale.record.last_seen, Some(t2));
        assert!(store.list_alerts(&child.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_seen_is_monotonic_across_commits() {
        let store = MemoryChildStateStore::new();
        let child = store.create("p-1", "Aarav").await.unwrap();

        let mut previous = None;
        for offset in [0, 5, 5, 10] {
            let ts = Utc::now() + Duration::seconds(offset);
            let outcome = store
                .commit(&child.id, delta(ts, 23.0, "zone"), vec![])
                .await
                .unwrap();
            if let Some(prev) = previous {
                assert!(outcome.record.last_seen.unwrap() >= prev);
            }
            previous = outcome.record.last_seen;
        }
    }

    #[tokio::test]
    async fn alerts_list_newest_first() {
        let store = MemoryChildStateStore::new();
        let child = store.create("p-1", "Aarav").await.unwrap();

        let t0 = Utc::now();
        for (i, msg) in ["first", "second"].iter().enumerate() {
            let mut alert = Alert::new(
                &child.id,
                AlertType::Location,
                Priority::Low,
                msg.to_string(),
                vec![],
            );
            alert.created_at = t0 + Duration::seconds(i as i64);
            store
                .commit(
                    &child.id,
                    delta(t0 + Duration::seconds(i as i64), 23.0, "zone"),
                    vec![alert],
                )
                .await
                .unwrap();
        }

        let alerts = store.list_alerts(&child.id).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].message, "second");
        assert_eq!(alerts[1].message, "first");
    }

    #[tokio::test]
    async fn unknown_child_is_not_found() {
        let store = MemoryChildStateStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_for_parent_hides_other_parents_children() {
        let store = MemoryChildStateStore::new();
        let child = store.create("p-1", "Aarav").await.unwrap();
        assert!(store.get_for_parent(&child.id, "p-2").await.is_err());
        assert!(store.get_for_parent(&child.id, "p-1").await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_commits_never_tear() {
        let store = Arc::new(MemoryChildStateStore::new());
        let child = store.create("p-1", "Aarav").await.unwrap();

        let t2 = Utc::now();
        let t1 = t2 - Duration::seconds(10);

        let a = {
            let store = store.clone();
            let id = child.id.clone();
            tokio::spawn(async move { store.commit(&id, delta(t1, 11.0, "old"), vec![]).await })
        };
        let b = {
            let store = store.clone();
            let id = child.id.clone();
            tokio::spawn(async move { store.commit(&id, delta(t2, 22.0, "new"), vec![]).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let record = store.get(&child.id).await.unwrap();
        // 无论调度顺序如何，最终状态必须整体等于 T2 的数据
        assert_eq!(record.last_seen, Some(t2));
        assert_eq!(record.last_latitude, Some(22.0));
        assert_eq!(record.current_zone.as_deref(), Some("new"));
    }
}
