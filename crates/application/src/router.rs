//! 消息路由
//!
//! 广播消息发给整个房间；私聊消息只投递给目标连接和发送者自己，
//! 目标另外收到一条通知。两种消息都走同一条房间通道，所以同一个
//! 发送者的消息按发出顺序到达每个接收方。路由器只读名册，从不修改它。

use std::sync::Arc;

use domain::{
    ChatMessage, ConnectionId, DomainError, Message, MessageRules, PresenceEntry, SendMessage,
    ServerEvent, Timestamp,
};

use crate::broadcaster::RoomBroadcaster;
use crate::presence::PresenceRegistry;

/// 单次投递的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// 广播消息送达的房间订阅者数
    pub room_receivers: usize,
    /// 私聊消息投递的连接数（包括发送者回显）
    pub delivered_to: usize,
    /// 是否向目标发出了通知
    pub notified: bool,
    /// 私聊目标不在线
    pub target_unresolved: bool,
}

pub struct MessageRouter {
    registry: Arc<PresenceRegistry>,
    room: Arc<RoomBroadcaster>,
}

impl MessageRouter {
    pub fn new(registry: Arc<PresenceRegistry>, room: Arc<RoomBroadcaster>) -> Self {
        Self { registry, room }
    }

    /// 校验入站消息并用已认证连接的身份盖章
    pub fn accept(
        &self,
        sender: &PresenceEntry,
        request: SendMessage,
        now: Timestamp,
    ) -> Result<ChatMessage, DomainError> {
        MessageRules::validate_body(&request.body)?;

        Ok(ChatMessage {
            message_id: request.message_id,
            from: sender.identity_id,
            from_name: sender.display_name.clone(),
            target: request.target,
            reply_to: request.reply_to,
            body: request.body,
            sent_at: now,
        })
    }

    pub async fn publish(&self, message: ChatMessage) -> DeliveryReport {
        if message.is_direct() {
            return self.publish_direct(message).await;
        }

        let room_receivers = self
            .room
            .publish(ServerEvent::MessageDelivered(Message::Chat(message)));
        DeliveryReport {
            room_receivers,
            ..DeliveryReport::default()
        }
    }

    async fn publish_direct(&self, message: ChatMessage) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let Some(target) = message.target else {
            return report;
        };
        let sender = message.from;

        // 发给自己时只投递一份，也不通知
        let target_connection = if target == sender {
            None
        } else {
            let connection = self.registry.connection_of(target).await;
            if connection.is_none() {
                tracing::debug!(
                    user_id = %sender,
                    target = %target,
                    "direct message target not connected, skipping"
                );
                report.target_unresolved = true;
            }
            connection
        };
        let sender_connection = self.registry.connection_of(sender).await;

        let recipients: Vec<ConnectionId> = target_connection
            .into_iter()
            .chain(sender_connection)
            .collect();
        report.delivered_to = recipients.len();

        let notification = message.notification();
        self.room.send_to(
            recipients,
            ServerEvent::MessageDelivered(Message::Chat(message)),
        );

        if let Some(connection) = target_connection {
            self.room
                .send_to(vec![connection], ServerEvent::Notify(notification));
            report.notified = true;
        }

        report
    }
}
