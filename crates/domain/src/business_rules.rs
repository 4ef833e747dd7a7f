//! 业务规则验证
//!
//! 吊销规则、账户字段规则与消息内容规则。

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::Timestamp;

/// 刷新令牌吊销规则
///
/// 登出只记录时间戳：签发时间早于最近一次登出的刷新令牌永久失效，
/// 之后签发的在自然过期前一直有效。没有黑名单，也不跟踪令牌ID。
pub struct RevocationPolicy;

impl RevocationPolicy {
    /// 刷新令牌是否仍可兑现
    pub fn is_honorable(issued_at: Timestamp, logout_at: Option<Timestamp>) -> bool {
        match logout_at {
            Some(logout_at) => issued_at >= logout_at,
            None => true,
        }
    }
}

/// 账户字段规则
pub struct AccountRules;

impl AccountRules {
    pub const DISPLAY_NAME_MAX: usize = 64;
    pub const PASSWORD_MIN: usize = 6;
    /// bcrypt 只使用前 72 字节
    pub const PASSWORD_MAX_BYTES: usize = 72;

    pub fn validate_display_name(display_name: &str) -> DomainResult<String> {
        let trimmed = display_name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation_error(
                "display_name",
                "cannot be empty",
            ));
        }
        if trimmed.chars().count() > Self::DISPLAY_NAME_MAX {
            return Err(DomainError::validation_error("display_name", "too long"));
        }
        Ok(trimmed.to_string())
    }

    pub fn validate_password(password: &str) -> DomainResult<()> {
        if password.chars().count() < Self::PASSWORD_MIN {
            return Err(DomainError::validation_error("password", "too short"));
        }
        if password.len() > Self::PASSWORD_MAX_BYTES {
            return Err(DomainError::validation_error("password", "too long"));
        }
        Ok(())
    }
}

/// 消息内容规则
pub struct MessageRules;

impl MessageRules {
    pub const BODY_MAX: usize = 2000;

    pub fn validate_body(body: &str) -> DomainResult<()> {
        if body.trim().is_empty() {
            return Err(DomainError::validation_error("body", "cannot be empty"));
        }
        if body.chars().count() > Self::BODY_MAX {
            return Err(DomainError::validation_error("body", "too long"));
        }
        Ok(())
    }
}
