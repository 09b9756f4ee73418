//! 内存存储实现
//!
//! 进程内的凭据库、房间库和消息日志。每个仓储用一把读写锁保护，
//! 检查与写入在同一次加锁内完成，唯一性约束因此是原子的。

use std::collections::HashMap;

use application::{MessageRepository, RoomRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Message, MessageId, RepositoryError, Room, RoomName, Timestamp, User, UserId, Username,
};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        let taken = users.values().any(|existing| {
            existing.username == user.username || existing.email == user.email
        });
        if taken || users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| &user.username == username)
            .cloned())
    }

    async fn update_username(
        &self,
        id: UserId,
        username: Username,
        now: Timestamp,
    ) -> Result<User, RepositoryError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|user| user.id != id && user.username == username)
        {
            return Err(RepositoryError::Conflict);
        }
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        user.rename(username, now);
        Ok(user.clone())
    }
}

#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<RoomName, Room>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn create(&self, room: Room) -> Result<Room, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.name) {
            return Err(RepositoryError::Conflict);
        }
        rooms.insert(room.name.clone(), room.clone());
        Ok(room)
    }

    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        Ok(self.rooms.read().await.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<Room>, RepositoryError> {
        Ok(self.rooms.read().await.values().cloned().collect())
    }

    async fn delete(&self, name: &RoomName) -> Result<(), RepositoryError> {
        self.rooms
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn add_member(
        &self,
        name: &RoomName,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(name).ok_or(RepositoryError::NotFound)?;
        Ok(room.add_member(user_id))
    }

    async fn remove_member(
        &self,
        name: &RoomName,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(name).ok_or(RepositoryError::NotFound)?;
        Ok(room.remove_member(user_id))
    }

    async fn rooms_of(&self, user_id: UserId) -> Result<Vec<RoomName>, RepositoryError> {
        let mut names: Vec<RoomName> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|room| room.is_member(user_id))
            .map(|room| room.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// 消息按追加顺序保存，即创建时间升序。
#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tail(mut matching: Vec<Message>, limit: usize) -> Vec<Message> {
        let skip = matching.len().saturating_sub(limit);
        matching.drain(..skip);
        matching
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut messages = self.messages.write().await;
        if messages.iter().any(|existing| existing.id == message.id) {
            return Err(RepositoryError::Conflict);
        }
        messages.push(message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .find(|message| message.id == id)
            .cloned())
    }

    async fn list_room(
        &self,
        room: &RoomName,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        let matching = self
            .messages
            .read()
            .await
            .iter()
            .filter(|message| message.room() == Some(room))
            .cloned()
            .collect();
        Ok(Self::tail(matching, limit))
    }

    async fn list_direct(
        &self,
        a: UserId,
        b: UserId,
        limit: usize,
    ) -> Result<Vec<Message>, RepositoryError> {
        let matching = self
            .messages
            .read()
            .await
            .iter()
            .filter(|message| message.is_between(a, b))
            .cloned()
            .collect();
        Ok(Self::tail(matching, limit))
    }

    async fn update(&self, message: Message) -> Result<Message, RepositoryError> {
        let mut messages = self.messages.write().await;
        let slot = messages
            .iter_mut()
            .find(|existing| existing.id == message.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = message.clone();
        Ok(message)
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        let index = messages
            .iter()
            .position(|message| message.id == id)
            .ok_or(RepositoryError::NotFound)?;
        messages.remove(index);
        Ok(())
    }
}
