//! 接收端消息历史
//!
//! 客户端按会话保留有限条消息：相同 `message_id` 的重复投递只保留一份，
//! 回复引用在本地历史中解析，找不到时显示占位文本而不是让整条消息失败。

use std::collections::{HashSet, VecDeque};

use crate::message::{ChatMessage, Message, Notification, PresenceBadge};
use crate::value_objects::{MessageId, UserId};

/// 回复引用的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPreview {
    /// 被引用消息仍在本地历史中
    Quoted { from_name: String, body: String },
    /// 历史已被截断或从未收到
    Unavailable,
}

impl ReplyPreview {
    pub const PLACEHOLDER: &'static str = "message unavailable";

    pub fn text(&self) -> &str {
        match self {
            ReplyPreview::Quoted { body, .. } => body,
            ReplyPreview::Unavailable => Self::PLACEHOLDER,
        }
    }
}

/// 有界的会话历史
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    capacity: usize,
    entries: VecDeque<Message>,
    seen: HashSet<MessageId>,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
            seen: HashSet::new(),
        }
    }

    /// 记录聊天消息，重复的 `message_id` 返回 false 且不改变历史
    pub fn record_chat(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.message_id) {
            return false;
        }
        self.push(Message::Chat(message));
        true
    }

    pub fn record_badge(&mut self, badge: PresenceBadge) {
        self.push(Message::Badge(badge));
    }

    pub fn record(&mut self, message: Message) -> bool {
        match message {
            Message::Chat(chat) => self.record_chat(chat),
            Message::Badge(badge) => {
                self.record_badge(badge);
                true
            }
        }
    }

    fn push(&mut self, message: Message) {
        self.entries.push_back(message);
        while self.entries.len() > self.capacity {
            if let Some(Message::Chat(evicted)) = self.entries.pop_front() {
                self.seen.remove(&evicted.message_id);
            }
        }
    }

    pub fn find(&self, message_id: MessageId) -> Option<&ChatMessage> {
        self.entries.iter().rev().find_map(|entry| match entry {
            Message::Chat(chat) if chat.message_id == message_id => Some(chat),
            _ => None,
        })
    }

    /// 解析回复引用；消息本身没有引用时返回 None
    pub fn resolve_reply(&self, message: &ChatMessage) -> Option<ReplyPreview> {
        let reply_to = message.reply_to?;
        Some(match self.find(reply_to) {
            Some(quoted) => ReplyPreview::Quoted {
                from_name: quoted.from_name.clone(),
                body: quoted.body.clone(),
            },
            None => ReplyPreview::Unavailable,
        })
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn chat_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.entries.iter().filter_map(|entry| match entry {
            Message::Chat(chat) => Some(chat),
            Message::Badge(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 通知是否需要弹出：接收方正在前台查看与发送者的会话时不再提示
    pub fn should_surface(notification: &Notification, foreground_peer: Option<UserId>) -> bool {
        foreground_peer != Some(notification.from)
    }
}
