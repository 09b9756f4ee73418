//! 基础设施层实现。
//!
//! 提供内存存储、密码哈希、JWT 会话认证等适配器，实现应用层定义的接口。

pub mod auth;
pub mod builder;
pub mod memory;
pub mod password;

pub use auth::JwtSessionAuthenticator;
pub use builder::{Infrastructure, Services};
pub use memory::{InMemoryMessageRepository, InMemoryRoomRepository, InMemoryUserRepository};
pub use password::BcryptPasswordHasher;
