use crate::value_objects::{PasswordHash, Timestamp, UserEmail, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    #[serde(skip_serializing)] // 密码字段不暴露给客户端
    pub password: PasswordHash,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn register(
        id: UserId,
        username: Username,
        email: UserEmail,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            email,
            password,
            created_at: now,
            updated_at: now,
        }
    }

    /// 修改昵称，返回旧昵称。唯一性由凭据库保证。
    pub fn rename(&mut self, username: Username, now: Timestamp) -> Username {
        self.updated_at = now;
        std::mem::replace(&mut self.username, username)
    }
}
