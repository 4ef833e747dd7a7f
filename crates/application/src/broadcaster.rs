// 公共房间的本地广播器
//
// 房间事件、私聊投递和对单个连接的回复都走同一条广播通道，
// 每个连接按接收范围过滤。同一通道保证任一连接看到的事件顺序
// 与发布顺序一致。
use domain::{ConnectionId, ServerEvent};
use tokio::sync::broadcast;

/// 事件的接收范围
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    Everyone,
    Connections(Vec<ConnectionId>),
}

impl Audience {
    pub fn includes(&self, connection_id: ConnectionId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::Connections(ids) => ids.contains(&connection_id),
        }
    }
}

/// 房间通道上的一条事件
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    pub audience: Audience,
    pub event: ServerEvent,
}

/// 房间内所有已登记连接共享的事件通道
#[derive(Clone)]
pub struct RoomBroadcaster {
    sender: broadcast::Sender<RoomEvent>,
}

impl RoomBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 以某个连接的身份订阅，只收到发给所有人或点名给它的事件
    pub fn subscribe(&self, connection_id: ConnectionId) -> RoomStream {
        RoomStream {
            receiver: self.sender.subscribe(),
            connection_id,
        }
    }

    /// 发给房间里的所有人；返回订阅者数量，房间里没人时不算错误
    pub fn publish(&self, event: ServerEvent) -> usize {
        self.send(RoomEvent {
            audience: Audience::Everyone,
            event,
        })
    }

    /// 只发给指定的连接
    pub fn send_to(&self, recipients: Vec<ConnectionId>, event: ServerEvent) -> usize {
        if recipients.is_empty() {
            return 0;
        }
        self.send(RoomEvent {
            audience: Audience::Connections(recipients),
            event,
        })
    }

    fn send(&self, event: RoomEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for RoomBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

// 单个连接的房间事件流
pub struct RoomStream {
    receiver: broadcast::Receiver<RoomEvent>,
    connection_id: ConnectionId,
}

impl RoomStream {
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(RoomEvent { audience, event }) => {
                    if audience.includes(self.connection_id) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        connection_id = %self.connection_id,
                        skipped,
                        "room stream lagged, dropping oldest events"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// 非阻塞读取，测试中用来确认没有多余事件
    pub fn try_recv(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(RoomEvent { audience, event }) => {
                    if audience.includes(self.connection_id) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{ErrorPayload, PresenceBadge};

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let room = RoomBroadcaster::new(8);
        assert_eq!(room.publish(ServerEvent::RosterUpdated(Vec::new())), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_events_in_order() {
        let room = RoomBroadcaster::new(8);
        let mut first = room.subscribe(ConnectionId::generate());
        let mut second = room.subscribe(ConnectionId::generate());

        room.publish(ServerEvent::PresenceBadge(PresenceBadge::join("ana")));
        room.publish(ServerEvent::PresenceBadge(PresenceBadge::leave("ana")));

        for stream in [&mut first, &mut second] {
            assert_eq!(
                stream.recv().await,
                Some(ServerEvent::PresenceBadge(PresenceBadge::join("ana")))
            );
            assert_eq!(
                stream.recv().await,
                Some(ServerEvent::PresenceBadge(PresenceBadge::leave("ana")))
            );
            assert!(stream.try_recv().is_none());
        }
    }

    #[tokio::test]
    async fn addressed_events_reach_only_their_recipients() {
        let room = RoomBroadcaster::new(8);
        let ana = ConnectionId::generate();
        let bob = ConnectionId::generate();
        let mut ana_stream = room.subscribe(ana);
        let mut bob_stream = room.subscribe(bob);

        let private = ServerEvent::Error(ErrorPayload::new("invalid-frame", "bad json"));
        room.send_to(vec![ana], private.clone());
        room.publish(ServerEvent::PresenceBadge(PresenceBadge::join("cat")));

        assert_eq!(ana_stream.recv().await, Some(private));
        assert_eq!(
            ana_stream.recv().await,
            Some(ServerEvent::PresenceBadge(PresenceBadge::join("cat")))
        );
        assert_eq!(
            bob_stream.recv().await,
            Some(ServerEvent::PresenceBadge(PresenceBadge::join("cat")))
        );
        assert!(bob_stream.try_recv().is_none());
        assert_eq!(room.send_to(Vec::new(), ServerEvent::RosterUpdated(Vec::new())), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest() {
        let room = RoomBroadcaster::new(2);
        let mut stream = room.subscribe(ConnectionId::generate());

        for name in ["a", "b", "c", "d"] {
            room.publish(ServerEvent::PresenceBadge(PresenceBadge::join(name)));
        }

        assert_eq!(
            stream.recv().await,
            Some(ServerEvent::PresenceBadge(PresenceBadge::join("c")))
        );
    }
}
