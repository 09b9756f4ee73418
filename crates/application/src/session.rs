use domain::{UserId, Username};

use crate::error::{ApplicationError, AuthError};

/// 令牌中携带的身份。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub username: Username,
}

/// 签发并校验绑定用户身份的无状态令牌。
#[cfg_attr(test, mockall::automock)]
pub trait SessionAuthenticator: Send + Sync {
    fn issue(&self, user_id: UserId, username: &Username) -> Result<String, ApplicationError>;

    /// 无副作用。
    fn verify(&self, token: &str) -> Result<SessionIdentity, AuthError>;
}
