use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 客户端发往中继的指令，线上格式为 `{"event": "<name>", "data": <payload>}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    JoinRoom(String),
    LeaveRoom(String),
    Message(ChannelMessage),
    PrivateMessage(DirectMessage),
    Typing(TypingUpdate),
    EditMessage(MessageEdit),
    DeleteMessage(Uuid),
    CreateRoom(String),
    DeleteRoom(String),
    SetNickname(String),
    ListRooms(Option<String>),
    GetUserList,
    PrivateHistory(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub room: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub to: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUpdate {
    pub room: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEdit {
    pub message_id: Uuid,
    pub content: String,
}

/// 可失败的操作种类，决定错误事件的名字。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    JoinRoom,
    LeaveRoom,
    SendMessage,
    SendPrivateMessage,
    Typing,
    EditMessage,
    DeleteMessage,
    CreateRoom,
    DeleteRoom,
    SetNickname,
    ListRooms,
    GetUserList,
    PrivateHistory,
}

impl ClientCommand {
    pub fn operation(&self) -> Operation {
        match self {
            Self::JoinRoom(_) => Operation::JoinRoom,
            Self::LeaveRoom(_) => Operation::LeaveRoom,
            Self::Message(_) => Operation::SendMessage,
            Self::PrivateMessage(_) => Operation::SendPrivateMessage,
            Self::Typing(_) => Operation::Typing,
            Self::EditMessage(_) => Operation::EditMessage,
            Self::DeleteMessage(_) => Operation::DeleteMessage,
            Self::CreateRoom(_) => Operation::CreateRoom,
            Self::DeleteRoom(_) => Operation::DeleteRoom,
            Self::SetNickname(_) => Operation::SetNickname,
            Self::ListRooms(_) => Operation::ListRooms,
            Self::GetUserList => Operation::GetUserList,
            Self::PrivateHistory(_) => Operation::PrivateHistory,
        }
    }
}
