use crate::value_objects::{MessageContent, MessageId, RoomName, Timestamp, UserId};

/// 消息的投递目标：房间消息与私信二选一。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MessageTarget {
    Room(RoomName),
    Direct(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub target: MessageTarget,
    pub created_at: Timestamp,
    pub edited: bool,
}

impl Message {
    pub fn new(
        id: MessageId,
        sender_id: UserId,
        content: MessageContent,
        target: MessageTarget,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            sender_id,
            content,
            target,
            created_at,
            edited: false,
        }
    }

    pub fn room(&self) -> Option<&RoomName> {
        match &self.target {
            MessageTarget::Room(room) => Some(room),
            MessageTarget::Direct(_) => None,
        }
    }

    pub fn recipient(&self) -> Option<UserId> {
        match self.target {
            MessageTarget::Direct(recipient) => Some(recipient),
            MessageTarget::Room(_) => None,
        }
    }

    pub fn is_sent_by(&self, user_id: UserId) -> bool {
        self.sender_id == user_id
    }

    /// 私信是否发生在两个用户之间（不区分方向）。
    pub fn is_between(&self, a: UserId, b: UserId) -> bool {
        match self.target {
            MessageTarget::Direct(recipient) => {
                (self.sender_id == a && recipient == b) || (self.sender_id == b && recipient == a)
            }
            MessageTarget::Room(_) => false,
        }
    }

    pub fn edit(&mut self, content: MessageContent) {
        self.content = content;
        self.edited = true;
    }
}
