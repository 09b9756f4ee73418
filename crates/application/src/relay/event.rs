use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::{MessageDto, RoomDto, UserSummary};
use crate::error::ApplicationError;

use super::command::Operation;

/// 中继推送给客户端的事件，线上格式与 [`super::ClientCommand`] 相同。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    PreviousMessages(RoomHistory),
    Message(MessageDto),
    PrivateMessage(MessageDto),
    PreviousPrivateMessages(PrivateHistory),
    UserJoined(PresenceNotice),
    UserLeft(PresenceNotice),
    UserJoinedChannel(ChannelMembership),
    UserLeftChannel(ChannelMembership),
    ChannelCreated(RoomDto),
    ChannelDeleted(RoomRef),
    ChannelList(Vec<RoomDto>),
    UserList(Vec<UserSummary>),
    UserNickChanged(NickChange),
    MessageUpdated(MessageDto),
    MessageDeleted(MessageRemoval),
    Typing(TypingNotice),

    JoinRoomError(ErrorPayload),
    LeaveRoomError(ErrorPayload),
    MessageError(ErrorPayload),
    PrivateMessageError(ErrorPayload),
    TypingError(ErrorPayload),
    EditMessageError(ErrorPayload),
    DeleteMessageError(ErrorPayload),
    CreateRoomError(ErrorPayload),
    DeleteRoomError(ErrorPayload),
    SetNicknameError(ErrorPayload),
    ListRoomsError(ErrorPayload),
    GetUserListError(ErrorPayload),
    PrivateHistoryError(ErrorPayload),
    InvalidCommand(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomHistory {
    pub room: String,
    pub messages: Vec<MessageDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateHistory {
    pub with: UserSummary,
    pub messages: Vec<MessageDto>,
}

/// `connections` 为该用户当前剩余的在线连接数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceNotice {
    pub user: UserSummary,
    pub connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMembership {
    pub room: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NickChange {
    pub user_id: Uuid,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRemoval {
    pub message_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub room: String,
    pub username: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

impl From<&ApplicationError> for ErrorPayload {
    fn from(err: &ApplicationError) -> Self {
        Self {
            code: err.code().to_owned(),
            message: err.client_message(),
        }
    }
}

impl ServerEvent {
    /// 操作失败时只回给发起连接的错误事件。
    pub fn failure(operation: Operation, err: &ApplicationError) -> Self {
        let payload = ErrorPayload::from(err);
        match operation {
            Operation::JoinRoom => Self::JoinRoomError(payload),
            Operation::LeaveRoom => Self::LeaveRoomError(payload),
            Operation::SendMessage => Self::MessageError(payload),
            Operation::SendPrivateMessage => Self::PrivateMessageError(payload),
            Operation::Typing => Self::TypingError(payload),
            Operation::EditMessage => Self::EditMessageError(payload),
            Operation::DeleteMessage => Self::DeleteMessageError(payload),
            Operation::CreateRoom => Self::CreateRoomError(payload),
            Operation::DeleteRoom => Self::DeleteRoomError(payload),
            Operation::SetNickname => Self::SetNicknameError(payload),
            Operation::ListRooms => Self::ListRoomsError(payload),
            Operation::GetUserList => Self::GetUserListError(payload),
            Operation::PrivateHistory => Self::PrivateHistoryError(payload),
        }
    }

    pub fn invalid_command(reason: impl Into<String>) -> Self {
        Self::InvalidCommand(ErrorPayload {
            code: "INVALID_COMMAND".to_owned(),
            message: reason.into(),
        })
    }

    #[cfg(test)]
    fn is_error(&self) -> bool {
        matches!(
            self,
            Self::JoinRoomError(_)
                | Self::LeaveRoomError(_)
                | Self::MessageError(_)
                | Self::PrivateMessageError(_)
                | Self::TypingError(_)
                | Self::EditMessageError(_)
                | Self::DeleteMessageError(_)
                | Self::CreateRoomError(_)
                | Self::DeleteRoomError(_)
                | Self::SetNicknameError(_)
                | Self::ListRoomsError(_)
                | Self::GetUserListError(_)
                | Self::PrivateHistoryError(_)
                | Self::InvalidCommand(_)
        )
    }
}
