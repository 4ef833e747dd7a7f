use std::ops::ControlFlow;

use crate::state::AppState;
use application::{CloseReason, RoomStream};
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use domain::{
    ClientEvent, ConnectionId, ErrorPayload, Identity, PresenceEntry, ServerEvent,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;

/// 连接生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Connecting,
    Authenticated,
    Registered,
    Closed,
}

/// WebSocket 连接管理器
///
/// 封装单个 WebSocket 连接的所有状态和逻辑，包括：
/// - 登记到在线名册（同一身份的旧连接会被挤下线）
/// - 房间广播与私有通道的合并发送
/// - 客户端事件的解析与路由
/// - 断开时的名册清理
pub struct WebSocketConnection {
    state: AppState,
    connection_id: ConnectionId,
    identity: Identity,
    phase: ConnectionPhase,
}

impl WebSocketConnection {
    /// 为通过会话网关的身份创建连接
    pub fn new(state: AppState, identity: Identity) -> Self {
        let mut connection = Self {
            state,
            connection_id: ConnectionId::generate(),
            identity,
            phase: ConnectionPhase::Connecting,
        };
        connection.advance(ConnectionPhase::Authenticated);
        connection
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    fn advance(&mut self, next: ConnectionPhase) {
        tracing::debug!(
            connection_id = %self.connection_id,
            user_id = %self.identity.id,
            from = ?self.phase,
            to = ?next,
            "connection phase changed"
        );
        self.phase = next;
    }

    fn presence_entry(&self) -> PresenceEntry {
        PresenceEntry {
            connection_id: self.connection_id,
            identity_id: self.identity.id,
            display_name: self.identity.display_name.clone(),
        }
    }

    /// 运行连接主循环，直到任一方向结束
    pub async fn run(mut self, socket: WebSocket) {
        // 先订阅房间再登记，自己的 join 提示和名册更新也能收到
        let room_stream = self.state.presence.room().subscribe(self.connection_id);
        let (close_tx, close_rx) = mpsc::unbounded_channel::<CloseReason>();

        let registration = self
            .state
            .presence
            .register(
                self.connection_id,
                self.identity.id,
                self.identity.display_name.clone(),
                close_tx,
            )
            .await;
        self.advance(ConnectionPhase::Registered);
        tracing::info!(
            connection_id = %self.connection_id,
            user_id = %self.identity.id,
            superseded = registration.evicted.is_some(),
            "WebSocket connection established"
        );

        let (sender, mut incoming) = socket.split();
        let mut send_task = tokio::spawn(Self::pump_outbound(sender, close_rx, room_stream));

        let state = self.state.clone();
        let entry = self.presence_entry();
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(message)) = incoming.next().await {
                if Self::handle_incoming(&state, &entry, message).await.is_break() {
                    break;
                }
            }
        });

        // 等待任意一个任务完成（连接断开或被挤下线）
        tokio::select! {
            _ = &mut send_task => {
                recv_task.abort();
            }
            _ = &mut recv_task => {
                send_task.abort();
            }
        }

        // 已被新连接取代时这里什么也不做
        self.state.presence.unregister(self.connection_id).await;
        self.advance(ConnectionPhase::Closed);

        tracing::info!(
            connection_id = %self.connection_id,
            user_id = %self.identity.id,
            "WebSocket connection closed"
        );
    }

    /// 统一处理所有对 WebSocket sender 的写操作
    ///
    /// 所有事件都来自房间通道，按发布顺序写出；关闭指令优先。
    async fn pump_outbound(
        mut sender: SplitSink<WebSocket, WsMessage>,
        mut close_rx: mpsc::UnboundedReceiver<CloseReason>,
        mut room_stream: RoomStream,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                reason = close_rx.recv() => {
                    if let Some(reason) = reason {
                        let _ = sender.send(close_message(reason)).await;
                    }
                    break;
                }
                room = room_stream.recv() => match room {
                    Some(event) => event,
                    None => break,
                },
            };

            let payload = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize websocket payload");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    }

    /// 处理来自客户端的帧；`Break` 表示连接应当结束
    async fn handle_incoming(
        state: &AppState,
        entry: &PresenceEntry,
        message: WsMessage,
    ) -> ControlFlow<()> {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => return ControlFlow::Break(()),
            WsMessage::Ping(_) | WsMessage::Pong(_) => return ControlFlow::Continue(()),
            WsMessage::Binary(_) => {
                reply(
                    state,
                    entry,
                    ErrorPayload::new("unsupported-frame", "binary frames are not supported"),
                );
                return ControlFlow::Continue(());
            }
        };

        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(connection_id = %entry.connection_id, error = %err, "invalid frame");
                reply(state, entry, ErrorPayload::new("invalid-frame", err.to_string()));
                return ControlFlow::Continue(());
            }
        };

        match event {
            ClientEvent::SendMessage(request) => {
                let now = state.clock.now();
                match state.message_router.accept(entry, request, now) {
                    Ok(message) => {
                        state.message_router.publish(message).await;
                    }
                    Err(err) => {
                        reply(state, entry, ErrorPayload::new("invalid-message", err.to_string()))
                    }
                }
            }
            ClientEvent::RequestRoster => {
                state.presence.send_roster_to(entry.connection_id).await;
            }
        }
        ControlFlow::Continue(())
    }
}

/// 错误回复也走房间通道，和之前的投递保持先后顺序
fn reply(state: &AppState, entry: &PresenceEntry, payload: ErrorPayload) {
    state
        .presence
        .room()
        .send_to(vec![entry.connection_id], ServerEvent::Error(payload));
}

fn close_message(reason: CloseReason) -> WsMessage {
    WsMessage::Close(Some(CloseFrame {
        code: reason.code(),
        reason: reason.as_str().into(),
    }))
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        tracing::debug!(
            connection_id = %self.connection_id,
            user_id = %self.identity.id,
            phase = ?self.phase,
            "WebSocketConnection dropped"
        );
    }
}
