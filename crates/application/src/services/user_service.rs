use std::sync::Arc;

use domain::{DomainError, RepositoryError, User, UserEmail, UserId, Username};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::TokenDto,
    error::{ApplicationError, ConflictError, NotFoundError},
    password::PasswordHasher,
    repository::UserRepository,
    session::SessionAuthenticator,
};

/// 密码最短长度（按字符计）。
pub const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;
        if request.password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(DomainError::invalid_argument(
                "password",
                format!("must be at least {PASSWORD_MIN_CHARS} characters"),
            )
            .into());
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;
        let user = User::register(
            UserId::from(Uuid::new_v4()),
            username,
            email,
            password_hash,
            self.deps.clock.now(),
        );

        // 唯一性由凭据库原子保证，这里不做先查后写
        let stored = self
            .deps
            .user_repository
            .create(user)
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ConflictError::UsernameOrEmailTaken.into(),
                other => ApplicationError::Persistence(other),
            })?;

        tracing::info!(user_id = %stored.id, username = %stored.username, "用户注册成功");
        Ok(stored)
    }

    /// 未知用户和错误密码返回同一个错误，避免泄露账号是否存在。
    pub async fn login(&self, request: LoginRequest) -> Result<TokenDto, ApplicationError> {
        let username =
            Username::parse(request.username).map_err(|_| ApplicationError::InvalidCredentials)?;
        let user = self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
            .ok_or(ApplicationError::InvalidCredentials)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            tracing::debug!(username = %username, "密码校验失败");
            return Err(ApplicationError::InvalidCredentials);
        }

        let access_token = self.deps.authenticator.issue(user.id, &user.username)?;
        Ok(TokenDto { access_token })
    }

    pub async fn find_by_id(&self, user_id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| NotFoundError::User.into())
    }

    /// 不合法的用户名不可能对应任何账号，按未找到处理。
    pub async fn find_by_username(&self, username: &str) -> Result<User, ApplicationError> {
        let username = Username::parse(username).map_err(|_| NotFoundError::User)?;
        self.deps
            .user_repository
            .find_by_username(&username)
            .await?
            .ok_or_else(|| NotFoundError::User.into())
    }

    /// 修改昵称，返回旧昵称与更新后的用户。
    pub async fn rename(
        &self,
        user_id: UserId,
        new_name: &str,
    ) -> Result<(Username, User), ApplicationError> {
        let new_name = Username::parse(new_name)?;
        let previous = self.find_by_id(user_id).await?.username;

        let updated = self
            .deps
            .user_repository
            .update_username(user_id, new_name, self.deps.clock.now())
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ConflictError::NicknameTaken.into(),
                RepositoryError::NotFound => NotFoundError::User.into(),
                other => ApplicationError::Persistence(other),
            })?;

        Ok((previous, updated))
    }
}
