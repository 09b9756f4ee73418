use std::collections::BTreeSet;

use crate::value_objects::{RoomName, Timestamp, UserId};

/// 始终存在、不可删除的默认房间。
pub const GENERAL_ROOM: &str = "general";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Room {
    pub name: RoomName,
    pub members: BTreeSet<UserId>,
    pub created_at: Timestamp,
}

impl Room {
    pub fn new(name: RoomName, created_at: Timestamp) -> Self {
        Self {
            name,
            members: BTreeSet::new(),
            created_at,
        }
    }

    pub fn general(created_at: Timestamp) -> Self {
        Self::new(RoomName::general(), created_at)
    }

    pub fn is_general(&self) -> bool {
        self.name.is_general()
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// 返回是否为新加入的成员。
    pub fn add_member(&mut self, user_id: UserId) -> bool {
        self.members.insert(user_id)
    }

    /// 返回成员是否原本存在。
    pub fn remove_member(&mut self, user_id: UserId) -> bool {
        self.members.remove(&user_id)
    }
}
