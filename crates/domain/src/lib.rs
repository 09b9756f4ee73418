//! 聊天中继的核心领域模型
//!
//! 包含用户、房间、消息三个实体，以及经过校验的值对象和错误类型。

pub mod errors;
pub mod message;
pub mod room;
pub mod user;
pub mod value_objects;

pub use errors::{DomainError, RepositoryError};
pub use message::{Message, MessageTarget};
pub use room::{Room, GENERAL_ROOM};
pub use user::User;
pub use value_objects::{
    ConnectionId, MessageContent, MessageId, PasswordHash, RoomName, Timestamp, UserEmail, UserId,
    Username,
};
