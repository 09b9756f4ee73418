//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务与实时中继核心：输入校验、
//! 会话认证、房间目录、在线连接表，以及对外部协作方
//! （凭据库、消息日志、密码哈希）的抽象。

pub mod clock;
pub mod dto;
pub mod error;
pub mod outbound;
pub mod password;
pub mod presence;
pub mod relay;
pub mod repository;
pub mod services;
pub mod session;

pub use clock::{Clock, SystemClock};
pub use dto::{MessageDto, RoomDto, TokenDto, UserDto, UserSummary, UNKNOWN_USERNAME};
pub use error::{ApplicationError, AuthError, ConflictError, NotFoundError, PermissionError};
pub use outbound::{Delivery, Outbound};
pub use password::{PasswordHasher, PasswordHasherError};
pub use presence::{Presence, PresenceRegistry};
pub use relay::{ChatRelay, ChatRelayDependencies, ClientCommand, Operation, ServerEvent};
pub use repository::{MessageRepository, RoomRepository, UserRepository};
pub use services::{
    LoginRequest, RegisterUserRequest, RoomDirectory, UserService, UserServiceDependencies,
};
pub use session::{SessionAuthenticator, SessionIdentity};
