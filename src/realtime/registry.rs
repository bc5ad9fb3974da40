use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

use super::events::OutboundEvent;

pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRole {
    Parent(String),
    Child(String),
}

/// 连接生命周期：connecting → identified → active → closed（终态）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Identified(ConnectionRole),
    Active,
    Closed,
}

#[derive(Default)]
struct RegistryInner {
    /// parent_id → 该家长房间内的活跃连接
    parent_rooms: HashMap<String, HashMap<ConnectionId, UnboundedSender<String>>>,
    conn_parents: HashMap<ConnectionId, String>,
    /// child_id → 当前连接，child 设备同一时刻只保留一条
    child_channels: HashMap<String, ConnectionId>,
    conn_children: HashMap<ConnectionId, String>,
}

/// 家长/儿童会话与活跃连接的映射，仅由连接建立、断开和 publish 访问
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    counter: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn bind_parent(
        &self,
        parent_id: &str,
        conn: ConnectionId,
        tx: UnboundedSender<String>,
    ) {
        let mut inner = self.inner.write().await;
        inner
            .parent_rooms
            .entry(parent_id.to_string())
            .or_default()
            .insert(conn, tx);
        inner.conn_parents.insert(conn, parent_id.to_string());
    }

    pub async fn bind_child(&self, child_id: &str, conn: ConnectionId) {
        let mut inner = self.inner.write().await;
        inner.child_channels.insert(child_id.to_string(), conn);
        inner.conn_children.insert(conn, child_id.to_string());
    }

    /// 幂等：未绑定或已解除的连接再次 unbind 不是错误
    pub async fn unbind(&self, conn: ConnectionId) {
        let mut inner = self.inner.write().await;
        if let Some(parent_id) = inner.conn_parents.remove(&conn) {
            if let Some(room) = inner.parent_rooms.get_mut(&parent_id) {
                room.remove(&conn);
                if room.is_empty() {
                    inner.parent_rooms.remove(&parent_id);
                }
            }
        }
        if let Some(child_id) = inner.conn_children.remove(&conn) {
            if inner.child_channels.get(&child_id) == Some(&conn) {
                inner.child_channels.remove(&child_id);
            }
        }
    }

    /// 投递到目标家长的全部活跃连接；无人订阅时静默返回 0，不缓存不重放
    pub async fn publish(&self, parent_id: &str, event: &OutboundEvent) -> usize {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize outbound event: {}", e);
                return 0;
            }
        };

        let mut inner = self.inner.write().await;
        let Some(room) = inner.parent_rooms.get_mut(parent_id) else {
            return 0;
        };

        let mut delivered = 0;
        // 发送失败说明对端已关闭，顺手清理失效连接
        room.retain(|_, tx| match tx.send(payload.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        if room.is_empty() {
            inner.parent_rooms.remove(parent_id);
        }
        delivered
    }

    pub async fn parent_connection_count(&self, parent_id: &str) -> usize {
        self.inner
            .read()
            .await
            .parent_rooms
            .get(parent_id)
            .map(|room| room.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alert, AlertType, Priority};
    use tokio::sync::mpsc;

    fn sample_event() -> OutboundEvent {
        OutboundEvent::NewAlert {
            child_id: "c-1".to_string(),
            alert: Alert::new(
                "c-1",
                AlertType::Location,
                Priority::Low,
                "arrived".to_string(),
                vec![],
            ),
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_bound_connection() {
        let registry = SessionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        registry
            .bind_parent("p-1", registry.next_connection_id(), tx1)
            .await;
        registry
            .bind_parent("p-1", registry.next_connection_id(), tx2)
            .await;

        let delivered = registry.publish("p-1", &sample_event()).await;
        assert_eq!(delivered, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_silent_noop() {
        let registry = SessionRegistry::new();
        let delivered = registry.publish("nobody", &sample_event()).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn publish_does_not_buffer_for_later_connections() {
        let registry = SessionRegistry::new();
        registry.publish("p-1", &sample_event()).await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .bind_parent("p-1", registry.next_connection_id(), tx)
            .await;
        // 迟到的连接收不到之前的事件
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unbind_is_idempotent_and_stops_delivery() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.next_connection_id();

        registry.bind_parent("p-1", conn, tx).await;
        assert_eq!(registry.parent_connection_count("p-1").await, 1);

        registry.unbind(conn).await;
        registry.unbind(conn).await;
        assert_eq!(registry.parent_connection_count("p-1").await, 0);
        assert_eq!(registry.publish("p-1", &sample_event()).await, 0);

        // 从未绑定过的连接同样允许 unbind
        registry.unbind(9999).await;
    }

    #[tokio::test]
    async fn closed_connections_are_pruned_on_publish() {
        let registry = SessionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry
            .bind_parent("p-1", registry.next_connection_id(), tx)
            .await;
        drop(rx);

        assert_eq!(registry.publish("p-1", &sample_event()).await, 0);
        assert_eq!(registry.parent_connection_count("p-1").await, 0);
    }

    #[tokio::test]
    async fn child_binding_tracks_latest_connection() {
        let registry = SessionRegistry::new();
        let first = registry.next_connection_id();
        let second = registry.next_connection_id();

        registry.bind_child("c-1", first).await;
        registry.bind_child("c-1", second).await;
        // 旧连接断开不影响新连接的绑定
        registry.unbind(first).await;

        let inner = registry.inner.read().await;
        assert_eq!(inner.child_channels.get("c-1"), Some(&second));
    }
}
