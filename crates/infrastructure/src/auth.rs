//! JWT 会话认证
//!
//! 令牌为 HS256 签名的无状态凭据，服务端不保存任何会话。

use std::sync::Arc;

use application::{ApplicationError, AuthError, Clock, SessionAuthenticator, SessionIdentity};
use chrono::Duration;
use config::JwtConfig;
use domain::{UserId, Username};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub iat: i64, // 签发时间 (Unix timestamp)
    pub exp: i64, // 过期时间 (Unix timestamp)
}

pub struct JwtSessionAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtSessionAuthenticator {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl: Duration::minutes(config.expiration_minutes),
            clock,
        }
    }
}

impl SessionAuthenticator for JwtSessionAuthenticator {
    fn issue(&self, user_id: UserId, username: &Username) -> Result<String, ApplicationError> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id.0,
            username: username.as_str().to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApplicationError::infrastructure(format!("token generation failed: {err}")))
    }

    fn verify(&self, token: &str) -> Result<SessionIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            tracing::debug!(error = %err, "会话令牌校验失败");
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidSignature,
            }
        })?;

        let username =
            Username::parse(data.claims.username).map_err(|_| AuthError::InvalidSignature)?;
        Ok(SessionIdentity {
            user_id: UserId::from(data.claims.sub),
            username,
        })
    }
}
