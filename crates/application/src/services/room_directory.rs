use std::sync::Arc;

use domain::{RepositoryError, Room, RoomName, UserId};

use crate::{
    clock::Clock,
    error::{ApplicationError, ConflictError, NotFoundError, PermissionError},
    repository::RoomRepository,
};

/// 房间目录：房间集合与持久成员列表。
///
/// `general` 房间启动时创建，不可删除。
pub struct RoomDirectory {
    rooms: Arc<dyn RoomRepository>,
    clock: Arc<dyn Clock>,
}

impl RoomDirectory {
    pub fn new(rooms: Arc<dyn RoomRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { rooms, clock }
    }

    pub async fn ensure_general(&self) -> Result<Room, ApplicationError> {
        let general = RoomName::general();
        if let Some(room) = self.rooms.find_by_name(&general).await? {
            return Ok(room);
        }
        match self.rooms.create(Room::general(self.clock.now())).await {
            Ok(room) => {
                tracing::info!(room = %room.name, "默认房间已创建");
                Ok(room)
            }
            // 并发启动时可能已被其他调用者创建
            Err(RepositoryError::Conflict) => self.find_by_name(&general).await,
            Err(err) => Err(err.into()),
        }
    }

    pub async fn create(&self, name: &str) -> Result<Room, ApplicationError> {
        let name = RoomName::parse(name)?;
        self.rooms
            .create(Room::new(name, self.clock.now()))
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ConflictError::DuplicateRoom.into(),
                other => ApplicationError::Persistence(other),
            })
    }

    pub async fn find_by_name(&self, name: &RoomName) -> Result<Room, ApplicationError> {
        self.rooms
            .find_by_name(name)
            .await?
            .ok_or_else(|| NotFoundError::Room.into())
    }

    /// 不区分大小写的子串匹配，按房间名排序；空查询返回全部房间。
    ///
    /// `include_general` 为真时即使不匹配也包含 `general`，供客户端填充房间选择列表。
    pub async fn search(
        &self,
        query: Option<&str>,
        include_general: bool,
    ) -> Result<Vec<Room>, ApplicationError> {
        let needle = query.map(str::trim).unwrap_or_default().to_lowercase();
        let mut rooms: Vec<Room> = self
            .rooms
            .list()
            .await?
            .into_iter()
            .filter(|room| {
                needle.is_empty()
                    || (include_general && room.is_general())
                    || room.name.as_str().to_lowercase().contains(&needle)
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rooms)
    }

    pub async fn delete(&self, name: &RoomName) -> Result<Room, ApplicationError> {
        if name.is_general() {
            return Err(PermissionError::ProtectedRoom.into());
        }
        let room = self.find_by_name(name).await?;
        self.rooms.delete(name).await.map_err(Self::missing_room)?;
        Ok(room)
    }

    /// 幂等；返回是否新增了成员。房间不存在时失败。
    pub async fn add_member(
        &self,
        name: &RoomName,
        user_id: UserId,
    ) -> Result<bool, ApplicationError> {
        self.rooms
            .add_member(name, user_id)
            .await
            .map_err(Self::missing_room)
    }

    /// 幂等；返回成员原本是否存在。
    pub async fn remove_member(
        &self,
        name: &RoomName,
        user_id: UserId,
    ) -> Result<bool, ApplicationError> {
        self.rooms
            .remove_member(name, user_id)
            .await
            .map_err(Self::missing_room)
    }

    pub async fn rooms_of(&self, user_id: UserId) -> Result<Vec<RoomName>, ApplicationError> {
        Ok(self.rooms.rooms_of(user_id).await?)
    }

    fn missing_room(err: RepositoryError) -> ApplicationError {
        match err {
            RepositoryError::NotFound => NotFoundError::Room.into(),
            other => ApplicationError::Persistence(other),
        }
    }
}
