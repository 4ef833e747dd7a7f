use std::sync::Arc;

use domain::{
    AccountRules, DomainError, Identity, RepositoryError, UserDirectory, UserId, Username,
};

use crate::{
    clock::Clock,
    error::ApplicationError,
    password::PasswordHasher,
    presence::{CloseReason, PresenceRegistry},
};

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_directory: Arc<dyn UserDirectory>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    pub presence: Arc<PresenceRegistry>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Identity, ApplicationError> {
        let username = Username::parse(request.username)?;
        AccountRules::validate_password(&request.password)?;

        if self
            .deps
            .user_directory
            .find_by_username(&username)
            .await?
            .is_some()
        {
            return Err(DomainError::user_already_exists(username.as_str()).into());
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;
        let identity = Identity::register(
            UserId::generate(),
            username.clone(),
            request.display_name,
            password_hash,
            self.deps.clock.now(),
        )?;

        // 并发注册同名用户时由目录的唯一约束兜底
        let stored = match self.deps.user_directory.create(identity).await {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Err(DomainError::user_already_exists(username.as_str()).into())
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(user_id = %stored.id, username = %stored.username.as_str(), "user registered");
        Ok(stored)
    }

    pub async fn authenticate(
        &self,
        request: AuthenticateRequest,
    ) -> Result<Identity, ApplicationError> {
        let username =
            Username::parse(request.username).map_err(|_| ApplicationError::Authentication)?;
        let identity = self
            .deps
            .user_directory
            .find_by_username(&username)
            .await?
            .ok_or(ApplicationError::Authentication)?;

        self.deps
            .password_hasher
            .ensure_matches(&request.password, &identity.credential_hash)
            .await?;

        Ok(identity)
    }

    /// 记录登出时间并断开该身份的在线连接
    pub async fn logout(&self, user_id: UserId) -> Result<(), ApplicationError> {
        let now = self.deps.clock.now();
        match self.deps.user_directory.record_logout(user_id, now).await {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                return Err(DomainError::user_not_found(user_id).into())
            }
            Err(err) => return Err(err.into()),
        }

        self.deps
            .presence
            .disconnect_identity(user_id, CloseReason::LoggedOut)
            .await;

        tracing::info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Identity, ApplicationError> {
        self.deps
            .user_directory
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(user_id).into())
    }
}
