use std::sync::Arc;

use application::{
    ApplicationError, ChatRelay, ChatRelayDependencies, Clock, MessageRepository, PasswordHasher,
    RoomDirectory, RoomRepository, SessionAuthenticator, SystemClock, UserRepository,
    UserService, UserServiceDependencies,
};
use config::{AppConfig, RelayConfig};

use crate::{
    auth::JwtSessionAuthenticator,
    memory::{InMemoryMessageRepository, InMemoryRoomRepository, InMemoryUserRepository},
    password::BcryptPasswordHasher,
};

/// 基础设施适配器集合，字段公开以便替换单个实现。
#[derive(Clone)]
pub struct Infrastructure {
    pub users: Arc<dyn UserRepository>,
    pub rooms: Arc<dyn RoomRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub clock: Arc<dyn Clock>,
}

/// 装配完成的应用服务
#[derive(Clone)]
pub struct Services {
    pub user_service: Arc<UserService>,
    pub room_directory: Arc<RoomDirectory>,
    pub relay: Arc<ChatRelay>,
}

impl Infrastructure {
    pub fn in_memory(config: &AppConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Self {
            users: Arc::new(InMemoryUserRepository::new()),
            rooms: Arc::new(InMemoryRoomRepository::new()),
            messages: Arc::new(InMemoryMessageRepository::new()),
            password_hasher: Arc::new(BcryptPasswordHasher::new(Some(
                config.security.bcrypt_cost,
            ))),
            authenticator: Arc::new(JwtSessionAuthenticator::new(&config.jwt, clock.clone())),
            clock,
        }
    }

    pub fn with_message_repository(mut self, messages: Arc<dyn MessageRepository>) -> Self {
        self.messages = messages;
        self
    }

    /// 构建用户服务、房间目录和中继，并确保 `general` 房间存在。
    pub async fn into_services(self, relay: RelayConfig) -> Result<Services, ApplicationError> {
        let user_service = Arc::new(UserService::new(UserServiceDependencies {
            user_repository: self.users,
            password_hasher: self.password_hasher,
            authenticator: self.authenticator.clone(),
            clock: self.clock.clone(),
        }));

        let room_directory = Arc::new(RoomDirectory::new(self.rooms, self.clock.clone()));
        room_directory.ensure_general().await?;

        let relay = Arc::new(ChatRelay::new(
            ChatRelayDependencies {
                user_service: user_service.clone(),
                room_directory: room_directory.clone(),
                message_repository: self.messages,
                authenticator: self.authenticator,
                clock: self.clock,
            },
            relay,
        ));

        Ok(Services {
            user_service,
            room_directory,
            relay,
        })
    }
}
