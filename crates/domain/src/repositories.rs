//! 用户目录接口
//!
//! 核心逻辑只依赖这几个查询；注册与登出写入由账户服务使用。

use async_trait::async_trait;

use crate::errors::RepositoryError;
use crate::user::Identity;
use crate::value_objects::{Timestamp, UserId, Username};

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 新建身份；用户名已存在时返回 `RepositoryError::Conflict`
    async fn create(&self, identity: Identity) -> Result<Identity, RepositoryError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, RepositoryError>;

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<Identity>, RepositoryError>;

    /// 记录登出时间；身份不存在时返回 `RepositoryError::NotFound`
    async fn record_logout(&self, id: UserId, at: Timestamp) -> Result<(), RepositoryError>;
}
