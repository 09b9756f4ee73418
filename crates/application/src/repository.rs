//! 外部存储协作方的接口。
//!
//! 实现方负责唯一性约束的原子性：并发的冲突写入中恰好一个成功，
//! 其余返回 `RepositoryError::Conflict`。

use async_trait::async_trait;
use domain::{
    Message, MessageId, RepositoryError, Room, RoomName, Timestamp, User, UserId, Username,
};

/// 凭据库。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 用户名或邮箱已被占用时返回 `Conflict`。
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;
    /// 其他用户已持有该名字时返回 `Conflict`，用户不存在时返回 `NotFound`。
    async fn update_username(
        &self,
        id: UserId,
        username: Username,
        now: Timestamp,
    ) -> Result<User, RepositoryError>;
}

/// 房间及其持久成员列表。
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 同名房间已存在时返回 `Conflict`。
    async fn create(&self, room: Room) -> Result<Room, RepositoryError>;
    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Room>, RepositoryError>;
    async fn delete(&self, name: &RoomName) -> Result<(), RepositoryError>;
    /// 房间不存在时返回 `NotFound`；`Ok(true)` 表示新增了成员。
    async fn add_member(&self, name: &RoomName, user_id: UserId)
        -> Result<bool, RepositoryError>;
    /// 房间不存在时返回 `NotFound`；`Ok(true)` 表示成员原本存在。
    async fn remove_member(
        &self,
        name: &RoomName,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;
    async fn rooms_of(&self, user_id: UserId) -> Result<Vec<RoomName>, RepositoryError>;
}

/// 消息日志：追加为主，另有编辑与删除。
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, message: Message) -> Result<Message, RepositoryError>;
    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError>;
    /// 房间最近的 `limit` 条消息，按创建时间升序。
    async fn list_room(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError>;
    /// 两个用户之间最近的 `limit` 条私信，按创建时间升序。
    async fn list_direct(
        &self,
        a: UserId,
        b: UserId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError>;
    async fn update(&self, message: Message) -> Result<Message, RepositoryError>;
    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError>;
}
