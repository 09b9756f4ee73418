//! 在线连接表
//!
//! 记录实时连接与已认证身份的映射，以及每个连接当前订阅的房间。
//! 只由 [`crate::ChatRelay`] 持有并在其串行化的操作路径上修改，
//! 进程重启后整体丢失。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use domain::{ConnectionId, RoomName, UserId, Username};

use crate::outbound::Outbound;
use crate::session::SessionIdentity;

#[derive(Debug)]
pub struct Presence {
    pub identity: SessionIdentity,
    pub rooms: BTreeSet<RoomName>,
    pub outbound: Outbound,
}

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: HashMap<ConnectionId, Presence>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, identity: SessionIdentity, outbound: Outbound) {
        self.connections.insert(
            id,
            Presence {
                identity,
                rooms: BTreeSet::new(),
                outbound,
            },
        );
    }

    /// 移除连接；返回的 `Presence` 被丢弃时发送队列随之关闭。
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Presence> {
        self.connections.remove(&id)
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<&Presence> {
        self.connections.get(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn all(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn connections_of(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, presence)| presence.identity.user_id == user_id)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn subscribers(&self, room: &RoomName) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, presence)| presence.rooms.contains(room))
            .map(|(id, _)| *id)
            .collect()
    }

    #[cfg(test)]
    fn is_subscribed(&self, id: ConnectionId, room: &RoomName) -> bool {
        self.connections
            .get(&id)
            .is_some_and(|presence| presence.rooms.contains(room))
    }

    pub fn subscribe(&mut self, id: ConnectionId, room: RoomName) -> bool {
        match self.connections.get_mut(&id) {
            Some(presence) => presence.rooms.insert(room),
            None => false,
        }
    }

    /// 为该用户的所有连接订阅房间。
    pub fn subscribe_user(&mut self, user_id: UserId, room: &RoomName) {
        for presence in self.connections.values_mut() {
            if presence.identity.user_id == user_id {
                presence.rooms.insert(room.clone());
            }
        }
    }

    pub fn unsubscribe_user(&mut self, user_id: UserId, room: &RoomName) {
        for presence in self.connections.values_mut() {
            if presence.identity.user_id == user_id {
                presence.rooms.remove(room);
            }
        }
    }

    pub fn unsubscribe_all(&mut self, room: &RoomName) {
        for presence in self.connections.values_mut() {
            presence.rooms.remove(room);
        }
    }

    /// 昵称修改后同步该用户所有连接上的身份。
    pub fn rename(&mut self, user_id: UserId, username: &Username) {
        for presence in self.connections.values_mut() {
            if presence.identity.user_id == user_id {
                presence.identity.username = username.clone();
            }
        }
    }

    /// 去重后的在线用户，按用户名排序。
    pub fn online_users(&self) -> Vec<SessionIdentity> {
        let users: BTreeMap<(Username, UserId), SessionIdentity> = self
            .connections
            .values()
            .map(|presence| {
                let identity = presence.identity.clone();
                ((identity.username.clone(), identity.user_id), identity)
            })
            .collect();
        users.into_values().collect()
    }

    pub fn outbound(&self, id: ConnectionId) -> Option<&Outbound> {
        self.connections.get(&id).map(|presence| &presence.outbound)
    }
}
