use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::password::PasswordHasherError;

/// 会话令牌校验失败。
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("session token is missing")]
    MissingToken,
    #[error("session token has expired")]
    Expired,
    #[error("session token signature is invalid")]
    InvalidSignature,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("room not found")]
    Room,
    #[error("user not found")]
    User,
    #[error("message not found")]
    Message,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConflictError {
    #[error("room already exists")]
    DuplicateRoom,
    #[error("nickname is already taken")]
    NicknameTaken,
    #[error("username or email is already taken")]
    UsernameOrEmailTaken,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PermissionError {
    #[error("not a member of this room")]
    NotMember,
    #[error("only the sender may change this message")]
    NotSender,
    #[error("the general room cannot be left or deleted")]
    ProtectedRoom,
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    Permission(#[from] PermissionError),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    /// 创建基础设施错误
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    /// 稳定的机器可读错误码，随错误事件和 HTTP 响应一起返回。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::MissingToken) => "MISSING_TOKEN",
            Self::Auth(AuthError::Expired) => "TOKEN_EXPIRED",
            Self::Auth(AuthError::InvalidSignature) => "INVALID_TOKEN",
            Self::NotFound(NotFoundError::Room) => "ROOM_NOT_FOUND",
            Self::NotFound(NotFoundError::User) => "USER_NOT_FOUND",
            Self::NotFound(NotFoundError::Message) => "MESSAGE_NOT_FOUND",
            Self::Conflict(ConflictError::DuplicateRoom) => "DUPLICATE_ROOM",
            Self::Conflict(ConflictError::NicknameTaken) => "NICKNAME_TAKEN",
            Self::Conflict(ConflictError::UsernameOrEmailTaken) => "USERNAME_OR_EMAIL_TAKEN",
            Self::Permission(PermissionError::NotMember) => "NOT_MEMBER",
            Self::Permission(PermissionError::NotSender) => "NOT_SENDER",
            Self::Permission(PermissionError::ProtectedRoom) => "PROTECTED_ROOM",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Invalid(_) => "INVALID_ARGUMENT",
            Self::Persistence(_) | Self::Password(_) | Self::Infrastructure(_) => "INTERNAL_ERROR",
        }
    }

    /// 存储、哈希等内部故障，细节只进日志。
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Persistence(_) | Self::Password(_) | Self::Infrastructure(_)
        )
    }

    /// 可以安全返回给客户端的描述。
    pub fn client_message(&self) -> String {
        if self.is_internal() {
            "internal error, please retry later".to_owned()
        } else {
            self.to_string()
        }
    }
}
