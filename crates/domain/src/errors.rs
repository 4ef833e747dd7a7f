//! 领域模型错误定义
//!
//! 凭证层面的失败不属于这里：令牌无效、已吊销等情况由会话网关
//! 转换成明确的判定结果，不以错误形式外泄。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 验证错误
    #[error("验证失败: {field}: {message}")]
    ValidationError { field: String, message: String },

    /// 用户名已被占用
    #[error("用户已存在: {username}")]
    UserAlreadyExists { username: String },

    /// 用户不存在
    #[error("用户不存在: {user_id}")]
    UserNotFound { user_id: String },
}

impl DomainError {
    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn user_already_exists(username: impl Into<String>) -> Self {
        Self::UserAlreadyExists {
            username: username.into(),
        }
    }

    pub fn user_not_found(user_id: impl ToString) -> Self {
        Self::UserNotFound {
            user_id: user_id.to_string(),
        }
    }
}

/// 领域操作结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 用户目录等外部存储的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
