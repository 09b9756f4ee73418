//! 测试环境管理
//!
//! 每个测试拥有独立的内存存储和中继实例，客户端直接持有发送队列的接收端，
//! 不经过真实的 WebSocket。

use std::sync::Arc;

use application::{
    outbound::Frame, ChatRelay, ClientCommand, LoginRequest, MessageRepository,
    RegisterUserRequest, ServerEvent,
};
use config::{AppConfig, RelayConfig};
use domain::{ConnectionId, User};
use infrastructure::{Infrastructure, Services};
use tokio::sync::mpsc::{self, error::TryRecvError};

pub const TEST_PASSWORD: &str = "correct-horse";
pub const TEST_SECRET: &str = "relay-integration-secret-with-enough-bytes";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = TEST_SECRET.to_owned();
    config.security.bcrypt_cost = 4;
    config
}

pub struct TestEnvironment {
    pub config: AppConfig,
    pub services: Services,
}

impl TestEnvironment {
    pub async fn start() -> Self {
        Self::build(test_config(), None).await
    }

    pub async fn with_relay_config(relay: RelayConfig) -> Self {
        let mut config = test_config();
        config.relay = relay;
        Self::build(config, None).await
    }

    pub async fn with_message_repository(messages: Arc<dyn MessageRepository>) -> Self {
        Self::build(test_config(), Some(messages)).await
    }

    async fn build(config: AppConfig, messages: Option<Arc<dyn MessageRepository>>) -> Self {
        let mut infrastructure = Infrastructure::in_memory(&config);
        if let Some(messages) = messages {
            infrastructure = infrastructure.with_message_repository(messages);
        }
        let services = infrastructure
            .into_services(config.relay.clone())
            .await
            .expect("services");
        Self { config, services }
    }

    pub fn relay(&self) -> &Arc<ChatRelay> {
        &self.services.relay
    }

    pub async fn register(&self, username: &str) -> User {
        self.services
            .user_service
            .register(RegisterUserRequest {
                username: username.to_owned(),
                email: format!("{username}@example.com"),
                password: TEST_PASSWORD.to_owned(),
            })
            .await
            .expect("register")
    }

    pub async fn token(&self, username: &str) -> String {
        self.services
            .user_service
            .login(LoginRequest {
                username: username.to_owned(),
                password: TEST_PASSWORD.to_owned(),
            })
            .await
            .expect("login")
            .access_token
    }

    /// 以已注册用户的身份建立一条连接
    pub async fn connect(&self, username: &str) -> TestClient {
        let token = self.token(username).await;
        let (outbound, frames) = self.relay().open_outbound();
        let connection = self
            .relay()
            .connect(Some(token.as_str()), outbound)
            .await
            .expect("connect");
        TestClient {
            connection,
            relay: self.relay().clone(),
            frames,
        }
    }

    /// 注册用户并建立连接，清空握手阶段的事件
    pub async fn join(&self, username: &str) -> TestClient {
        self.register(username).await;
        let mut client = self.connect(username).await;
        client.drain();
        client
    }
}

pub struct TestClient {
    pub connection: ConnectionId,
    relay: Arc<ChatRelay>,
    frames: mpsc::Receiver<Frame>,
}

impl TestClient {
    pub async fn send(&self, command: ClientCommand) {
        self.relay.handle(self.connection, command).await;
    }

    pub async fn disconnect(&self) {
        self.relay.disconnect(self.connection).await;
    }

    /// 取出已投递的全部事件
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            events.push(serde_json::from_str(&frame).expect("server event"));
        }
        events
    }

    /// 队列中的事件读完后，发送端是否已被中继丢弃
    pub fn is_evicted(&mut self) -> bool {
        loop {
            match self.frames.try_recv() {
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }
}
