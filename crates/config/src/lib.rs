//! 统一配置中心
//!
//! 提供聊天中继的全局配置，包括：
//! - 服务监听地址
//! - JWT 会话令牌
//! - 中继参数（发送队列容量、历史条数、消息长度）
//! - 密码哈希强度
//!
//! 加载顺序：默认值 -> 可选配置文件（`APP_CONFIG_FILE`，TOML）-> 环境变量（`APP_*`，
//! 嵌套字段用 `__` 分隔，例如 `APP_JWT__SECRET`）。

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 开发环境默认密钥，`validate` 会拒绝它。
const DEV_JWT_SECRET: &str = "dev-secret-key-not-for-production-use-minimum-32-chars";

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub jwt: JwtConfig,
    #[validate(nested)]
    pub relay: RelayConfig,
    #[validate(nested)]
    pub security: SecurityConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
}

/// JWT配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    /// 至少 256 位
    #[validate(length(min = 32))]
    pub secret: String,
    #[validate(range(min = 1))]
    pub expiration_minutes: i64,
}

/// 中继配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// 每个连接发送队列的容量，写满即视为慢速客户端
    #[validate(range(min = 1))]
    pub outbound_capacity: usize,
    /// 加入房间时推送的历史消息条数
    #[validate(range(min = 1))]
    pub history_limit: usize,
    #[validate(range(min = 1))]
    pub max_message_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityConfig {
    #[validate(range(min = 4, max = 31))]
    pub bcrypt_cost: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            jwt: JwtConfig {
                secret: DEV_JWT_SECRET.into(),
                expiration_minutes: 60,
            },
            relay: RelayConfig::default(),
            security: SecurityConfig { bcrypt_cost: 10 },
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            history_limit: 100,
            max_message_length: 500,
        }
    }
}

impl AppConfig {
    /// 按 默认值 -> 配置文件 -> 环境变量 的优先级加载并校验。
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// 字段范围校验之外，拒绝开发环境密钥。
    pub fn validate(&self) -> Result<(), ConfigError> {
        Validate::validate(self)?;

        if self.jwt.secret == DEV_JWT_SECRET
            || self.jwt.secret.contains("dev-secret")
            || self.jwt.secret.contains("please-change")
        {
            return Err(ConfigError::InvalidJwtSecret(
                "Cannot use development JWT secret, set APP_JWT__SECRET".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
    #[error("Invalid JWT secret: {0}")]
    InvalidJwtSecret(String),
}
