use std::time::Duration;

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitStream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::registry::{ConnectionRole, ConnectionState};
use crate::AppState;
use crate::ingest::LocationUpdate;
use crate::utils::verify_token;

/// 家长连接必须在该窗口内完成 identify 握手
const IDENTIFY_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(rename = "childId")]
    pub child_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentifyMessage {
    #[serde(rename = "type")]
    kind: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct WsAck {
    #[serde(rename = "type")]
    kind: &'static str,
    status: &'static str,
    message: String,
    #[serde(rename = "currentZone", skip_serializing_if = "Option::is_none")]
    current_zone: Option<String>,
    #[serde(rename = "nearbyPlace", skip_serializing_if = "Option::is_none")]
    nearby_place: Option<String>,
}

impl WsAck {
    fn error(message: String) -> Self {
        Self {
            kind: "ack",
            status: "error",
            message,
            current_zone: None,
            nearby_place: None,
        }
    }
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket, query.child_id))
}

async fn handle_socket(state: AppState, socket: WebSocket, child_id: Option<String>) {
    let conn = state.registry.next_connection_id();
    let mut conn_state = ConnectionState::Connecting;
    tracing::debug!(conn, ?conn_state, "WebSocket client connected");

    let (mut sink, mut stream) = socket.split();

    // 身份解析只做一次：child 走连接参数，parent 走显式 identify 消息
    let role = match child_id {
        Some(id) => ConnectionRole::Child(id),
        None => match wait_for_identify(&state, &mut stream).await {
            Ok(role) => role,
            Err(reason) => {
                tracing::info!(conn, "WebSocket identify failed: {}", reason);
                let ack = serde_json::to_string(&WsAck::error(reason)).unwrap_or_default();
                let _ = sink.send(Message::Text(ack.into())).await;
                let _ = sink.close().await;
                return;
            }
        },
    };
    conn_state = ConnectionState::Identified(role.clone());
    tracing::debug!(conn, ?conn_state, "WebSocket client identified");

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    match &role {
        ConnectionRole::Parent(parent_id) => {
            state.registry.bind_parent(parent_id, conn, tx.clone()).await;
            tracing::info!("Parent connection {} joined room {}", conn, parent_id);
        }
        ConnectionRole::Child(child) => {
            state.registry.bind_child(child, conn).await;
            tracing::info!("Child device connected: {} (conn {})", child, conn);
        }
    }
    conn_state = ConnectionState::Active;
    tracing::debug!(conn, ?conn_state, "WebSocket client active");

    let mut send_task = tokio::spawn(async move {
        while let Some(json) = rx.recv().await {
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_role = role.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    if let ConnectionRole::Child(child) = &recv_role {
                        handle_child_message(&recv_state, child, text.as_str(), &tx).await;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // 任一方向结束即收尾，立即释放会话绑定
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.unbind(conn).await;
    conn_state = ConnectionState::Closed;
    tracing::info!(conn, ?conn_state, "WebSocket client disconnected");
}

async fn wait_for_identify(
    state: &AppState,
    stream: &mut SplitStream<WebSocket>,
) -> Result<ConnectionRole, String> {
    let message = tokio::time::timeout(IDENTIFY_WAIT, stream.next())
        .await
        .map_err(|_| "Identify handshake timed out.".to_string())?;

    let Some(Ok(Message::Text(text))) = message else {
        return Err("Expected an identify message.".to_string());
    };

    let identify: IdentifyMessage = serde_json::from_str(text.as_str())
        .map_err(|_| "Malformed identify message.".to_string())?;
    if identify.kind != "identify" {
        return Err("Expected an identify message.".to_string());
    }

    let token = identify
        .token
        .ok_or_else(|| "Identify message missing token.".to_string())?;
    let claims = verify_token(&token, &state.config)
        .map_err(|_| "Invalid or expired token.".to_string())?;

    Ok(ConnectionRole::Parent(claims.sub))
}

async fn handle_child_message(
    state: &AppState,
    child_id: &str,
    text: &str,
    ack_tx: &mpsc::UnboundedSender<String>,
) {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            send_ack(ack_tx, WsAck::error("Malformed message.".to_string()));
            return;
        }
    };

    if value.get("type").and_then(|t| t.as_str()) != Some("locationUpdate") {
        // 未知消息类型直接忽略，保持通道可用
        return;
    }

    let update: LocationUpdate = match serde_json::from_value(value) {
        Ok(update) => update,
        Err(_) => {
            send_ack(
                ack_tx,
                WsAck::error("childId, latitude, and longitude are required.".to_string()),
            );
            return;
        }
    };

    tracing::debug!("Received location update from child {}", child_id);
    match state.core.ingest(update).await {
        Ok(ack) => send_ack(
            ack_tx,
            WsAck {
                kind: "ack",
                status: "success",
                message: ack.message,
                current_zone: Some(ack.current_zone),
                nearby_place: Some(ack.nearby_place),
            },
        ),
        Err(e) => {
            tracing::error!("Error updating child location: {}", e);
            send_ack(ack_tx, WsAck::error(e.to_string()));
        }
    }
}

fn send_ack(ack_tx: &mpsc::UnboundedSender<String>, ack: WsAck) {
    if let Ok(json) = serde_json::to_string(&ack) {
        let _ = ack_tx.send(json);
    }
}
