//! 连接层事件词汇
//!
//! 所有帧都是 `{"event": <名称>, "data": <载荷>}` 形式的 JSON。

use serde::{Deserialize, Serialize};

use crate::message::{Message, Notification, PresenceBadge, RosterEntry};
use crate::value_objects::{MessageId, UserId};

/// 客户端发往服务器的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// 发送消息
    SendMessage(SendMessage),
    /// 请求完整名册
    RequestRoster,
}

/// `send-message` 载荷；发送者身份取自已认证的连接，不信任客户端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessage {
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    pub body: String,
}

/// 服务器发往客户端的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// 名册变化后的完整名册
    RosterUpdated(Vec<RosterEntry>),
    /// 消息投递
    MessageDelivered(Message),
    /// 私聊通知
    Notify(Notification),
    /// 进出提示
    PresenceBadge(PresenceBadge),
    /// 入站帧被拒绝
    Error(ErrorPayload),
}

/// 错误事件载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
