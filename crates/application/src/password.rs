//! 口令哈希抽象
//!
//! 注册时把明文口令换成可存储的哈希，登录时拿明文和存储的哈希比对。
//! 具体算法在基础设施层实现。

use async_trait::async_trait;
use domain::PasswordHash;
use thiserror::Error;

use crate::error::ApplicationError;

#[derive(Debug, Error)]
pub enum PasswordHasherError {
    #[error("failed to hash credential: {0}")]
    Hash(String),
    /// 比对过程本身出错，不是口令不匹配
    #[error("failed to verify credential: {0}")]
    Verify(String),
    /// 阻塞线程上的哈希任务没有正常结束
    #[error("hashing worker failed: {0}")]
    Worker(String),
}

impl PasswordHasherError {
    pub fn hash_error(message: impl Into<String>) -> Self {
        Self::Hash(message.into())
    }

    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::Verify(message.into())
    }

    pub fn worker_error(message: impl Into<String>) -> Self {
        Self::Worker(message.into())
    }
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;

    /// 口令不匹配、存储的哈希格式损坏都返回 `Ok(false)`
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;

    /// 登录校验：不匹配时返回 `Authentication`，和用户不存在时的错误一样
    async fn ensure_matches(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<(), ApplicationError> {
        if self.verify(plaintext, hashed).await? {
            Ok(())
        } else {
            Err(ApplicationError::Authentication)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 只接受一个固定口令，遇到 "broken" 前缀的哈希时模拟哈希器故障
    struct FixedHasher;

    #[async_trait]
    impl PasswordHasher for FixedHasher {
        async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
            PasswordHash::new(format!("fixed:{plaintext}"))
                .map_err(|err| PasswordHasherError::hash_error(err.to_string()))
        }

        async fn verify(
            &self,
            plaintext: &str,
            hashed: &PasswordHash,
        ) -> Result<bool, PasswordHasherError> {
            if hashed.as_str().starts_with("broken") {
                return Err(PasswordHasherError::worker_error("worker panicked"));
            }
            Ok(hashed.as_str() == format!("fixed:{plaintext}"))
        }
    }

    #[tokio::test]
    async fn matching_password_passes() {
        let hashed = FixedHasher.hash("secret-pass").await.unwrap();
        assert!(FixedHasher.ensure_matches("secret-pass", &hashed).await.is_ok());
    }

    #[tokio::test]
    async fn mismatch_is_an_authentication_failure() {
        let hashed = FixedHasher.hash("secret-pass").await.unwrap();
        let err = FixedHasher
            .ensure_matches("wrong-pass", &hashed)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Authentication));
    }

    #[tokio::test]
    async fn hasher_failure_is_not_reported_as_bad_password() {
        let hashed = PasswordHash::new("broken-hash").unwrap();
        let err = FixedHasher
            .ensure_matches("secret-pass", &hashed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Password(PasswordHasherError::Worker(_))
        ));
    }
}
