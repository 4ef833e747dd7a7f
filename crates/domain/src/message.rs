//! 消息与在线名册实体
//!
//! 消息流是带标签的联合类型：用户发送的聊天消息，以及由在线名册
//! 变化生成的进出提示。路由和渲染按 `type` 标签分派。

use serde::{Deserialize, Serialize};

use crate::value_objects::{ConnectionId, MessageId, Timestamp, UserId};

/// 聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: MessageId,
    pub from: UserId,
    pub from_name: String,
    /// 为空表示发往公共房间
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    pub body: String,
    pub sent_at: Timestamp,
}

impl ChatMessage {
    pub fn is_direct(&self) -> bool {
        self.target.is_some()
    }

    /// 生成发给接收方的通知
    pub fn notification(&self) -> Notification {
        Notification {
            message_id: self.message_id,
            from: self.from,
            from_name: self.from_name.clone(),
            body: self.body.clone(),
            sent_at: self.sent_at,
        }
    }
}

/// 进出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeStatus {
    Join,
    Leave,
}

/// 在线名册变化产生的提示，不持久化，也不参与回复引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceBadge {
    pub display_name: String,
    pub status: BadgeStatus,
}

impl PresenceBadge {
    pub fn join(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            status: BadgeStatus::Join,
        }
    }

    pub fn leave(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            status: BadgeStatus::Leave,
        }
    }
}

/// 消息流中的一项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    #[serde(rename = "message")]
    Chat(ChatMessage),
    Badge(PresenceBadge),
}

/// 私聊通知，与消息投递事件分开发送
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message_id: MessageId,
    pub from: UserId,
    pub from_name: String,
    pub body: String,
    pub sent_at: Timestamp,
}

/// 名册中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub identity_id: UserId,
    pub display_name: String,
}

/// 在线登记：每个身份同一时刻至多一条
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub connection_id: ConnectionId,
    pub identity_id: UserId,
    pub display_name: String,
}

impl PresenceEntry {
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            identity_id: self.identity_id,
            display_name: self.display_name.clone(),
        }
    }
}
