use domain::{Message, Room, Timestamp, User, UserId, Username};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: Timestamp,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.as_str().to_owned(),
            email: user.email.as_str().to_owned(),
            created_at: user.created_at,
        }
    }
}

/// 发送者已被删除时历史消息里展示的用户名
pub const UNKNOWN_USERNAME: &str = "unknown";

/// 事件中引用用户时使用的精简结构。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
}

impl UserSummary {
    pub fn new(id: UserId, username: &Username) -> Self {
        Self {
            id: Uuid::from(id),
            username: username.as_str().to_owned(),
        }
    }

    /// 凭据存储中已不存在的用户
    pub fn unknown(id: UserId) -> Self {
        Self {
            id: Uuid::from(id),
            username: UNKNOWN_USERNAME.to_owned(),
        }
    }
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self::new(user.id, &user.username)
    }
}

impl From<&SessionIdentity> for UserSummary {
    fn from(identity: &SessionIdentity) -> Self {
        Self::new(identity.user_id, &identity.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<UserSummary>,
    pub sender: UserSummary,
    pub created_at: Timestamp,
    pub edited: bool,
}

impl MessageDto {
    /// `recipient` 仅对私信有意义，房间消息忽略该参数。
    pub fn new(message: &Message, sender: UserSummary, recipient: Option<UserSummary>) -> Self {
        Self {
            id: message.id.0,
            content: message.content.as_str().to_owned(),
            room: message.room().map(|room| room.as_str().to_owned()),
            recipient: message.recipient().and(recipient),
            sender,
            created_at: message.created_at,
            edited: message.edited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    pub name: String,
    pub member_count: usize,
    pub created_at: Timestamp,
}

impl From<&Room> for RoomDto {
    fn from(room: &Room) -> Self {
        Self {
            name: room.name.as_str().to_owned(),
            member_count: room.members.len(),
            created_at: room.created_at,
        }
    }
}

/// 登录响应，字段名沿用 OAuth 风格。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDto {
    pub access_token: String,
}
