//! 在线名册
//!
//! 每个身份同一时刻至多一条在线登记。新连接登记时先驱逐旧连接再插入，
//! 名册变化通过房间广播器通知所有订阅者。登记表和连接到身份的反查表
//! 放在同一把写锁下，房间事件也在锁内发出，订阅者看到的事件顺序
//! 与名册变更顺序一致。

use std::collections::HashMap;
use std::sync::Arc;

use domain::{ConnectionId, PresenceBadge, PresenceEntry, RosterEntry, ServerEvent, UserId};
use tokio::sync::{mpsc, RwLock};

use crate::broadcaster::RoomBroadcaster;

/// 服务端主动关闭连接的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// 同一身份在别处建立了新连接
    Superseded,
    LoggedOut,
    Shutdown,
}

impl CloseReason {
    /// WebSocket 关闭码
    pub fn code(self) -> u16 {
        match self {
            CloseReason::Superseded => 4000,
            CloseReason::LoggedOut => 4001,
            CloseReason::Shutdown => 1001,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::Superseded => "superseded",
            CloseReason::LoggedOut => "logged-out",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

/// 向单个连接下达关闭指令的通道；事件本身都走房间通道
pub type CloseSender = mpsc::UnboundedSender<CloseReason>;

/// 登记结果
#[derive(Debug, Clone)]
pub struct Registration {
    /// 被驱逐的旧登记
    pub evicted: Option<PresenceEntry>,
    /// 登记完成后的名册
    pub roster: Vec<RosterEntry>,
}

struct Slot {
    entry: PresenceEntry,
    closer: CloseSender,
}

#[derive(Default)]
struct RegistryState {
    by_identity: HashMap<UserId, Slot>,
    by_connection: HashMap<ConnectionId, UserId>,
}

impl RegistryState {
    fn snapshot(&self) -> Vec<RosterEntry> {
        let mut roster: Vec<RosterEntry> = self
            .by_identity
            .values()
            .map(|slot| slot.entry.roster_entry())
            .collect();
        roster.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.identity_id.0.cmp(&b.identity_id.0))
        });
        roster
    }

    fn remove_identity(&mut self, identity_id: UserId) -> Option<Slot> {
        let slot = self.by_identity.remove(&identity_id)?;
        self.by_connection.remove(&slot.entry.connection_id);
        Some(slot)
    }
}

pub struct PresenceRegistry {
    state: RwLock<RegistryState>,
    room: Arc<RoomBroadcaster>,
}

impl PresenceRegistry {
    pub fn new(room: Arc<RoomBroadcaster>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            room,
        }
    }

    pub fn room(&self) -> &Arc<RoomBroadcaster> {
        &self.room
    }

    /// 登记连接；同一身份已有的连接会收到 `superseded` 关闭指令
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        identity_id: UserId,
        display_name: impl Into<String>,
        closer: CloseSender,
    ) -> Registration {
        let entry = PresenceEntry {
            connection_id,
            identity_id,
            display_name: display_name.into(),
        };

        let mut state = self.state.write().await;

        let evicted = state.remove_identity(identity_id).map(|old| {
            tracing::info!(
                user_id = %identity_id,
                connection_id = %old.entry.connection_id,
                replaced_by = %connection_id,
                "evicting superseded connection"
            );
            // 旧连接可能已经断开，发送失败无妨
            let _ = old.closer.send(CloseReason::Superseded);
            old.entry
        });

        state.by_connection.insert(connection_id, identity_id);
        state.by_identity.insert(
            identity_id,
            Slot {
                entry: entry.clone(),
                closer,
            },
        );

        let roster = state.snapshot();
        self.room.publish(ServerEvent::RosterUpdated(roster.clone()));
        if evicted.is_none() {
            self.room.publish(ServerEvent::PresenceBadge(PresenceBadge::join(
                entry.display_name.clone(),
            )));
        }

        tracing::info!(
            user_id = %identity_id,
            connection_id = %connection_id,
            online = roster.len(),
            "connection registered"
        );

        Registration { evicted, roster }
    }

    /// 注销连接；连接已被驱逐时什么也不做
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<PresenceEntry> {
        let mut state = self.state.write().await;

        let identity_id = state.by_connection.remove(&connection_id)?;
        let slot = state.by_identity.remove(&identity_id)?;

        self.room
            .publish(ServerEvent::RosterUpdated(state.snapshot()));
        self.room.publish(ServerEvent::PresenceBadge(PresenceBadge::leave(
            slot.entry.display_name.clone(),
        )));

        tracing::info!(
            user_id = %identity_id,
            connection_id = %connection_id,
            "connection unregistered"
        );

        Some(slot.entry)
    }

    /// 强制下线某个身份（登出时使用）
    pub async fn disconnect_identity(
        &self,
        identity_id: UserId,
        reason: CloseReason,
    ) -> Option<PresenceEntry> {
        let mut state = self.state.write().await;
        let slot = state.remove_identity(identity_id)?;

        let _ = slot.closer.send(reason);
        self.room
            .publish(ServerEvent::RosterUpdated(state.snapshot()));
        self.room.publish(ServerEvent::PresenceBadge(PresenceBadge::leave(
            slot.entry.display_name.clone(),
        )));

        tracing::info!(
            user_id = %identity_id,
            connection_id = %slot.entry.connection_id,
            reason = reason.as_str(),
            "identity disconnected"
        );

        Some(slot.entry)
    }

    /// 名册快照，按显示名再按身份ID排序
    pub async fn snapshot(&self) -> Vec<RosterEntry> {
        self.state.read().await.snapshot()
    }

    /// 把当前名册单独发给一个连接；快照和发送在同一把读锁下，
    /// 不会排到之后的名册变更后面
    pub async fn send_roster_to(&self, connection_id: ConnectionId) -> Vec<RosterEntry> {
        let state = self.state.read().await;
        let roster = state.snapshot();
        self.room
            .send_to(vec![connection_id], ServerEvent::RosterUpdated(roster.clone()));
        roster
    }

    pub async fn entry_for(&self, identity_id: UserId) -> Option<PresenceEntry> {
        self.state
            .read()
            .await
            .by_identity
            .get(&identity_id)
            .map(|slot| slot.entry.clone())
    }

    /// 身份当前在线连接的ID
    pub async fn connection_of(&self, identity_id: UserId) -> Option<ConnectionId> {
        self.state
            .read()
            .await
            .by_identity
            .get(&identity_id)
            .map(|slot| slot.entry.connection_id)
    }

    pub async fn is_online(&self, identity_id: UserId) -> bool {
        self.state.read().await.by_identity.contains_key(&identity_id)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.by_identity.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 关闭所有连接并清空名册
    pub async fn shutdown(&self) {
        let mut state = self.state.write().await;
        let closed = state.by_identity.len();

        for (_, slot) in state.by_identity.drain() {
            let _ = slot.closer.send(CloseReason::Shutdown);
        }
        state.by_connection.clear();

        self.room.publish(ServerEvent::RosterUpdated(Vec::new()));
        tracing::info!(closed, "presence registry shut down");
    }
}
