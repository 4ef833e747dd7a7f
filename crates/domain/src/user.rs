//! 身份实体定义
//!
//! 身份由外部用户目录持有，核心逻辑只读取它；注册与登出是仅有的写入路径。

use crate::business_rules::AccountRules;
use crate::errors::DomainResult;
use crate::message::RosterEntry;
use crate::value_objects::{PasswordHash, Timestamp, UserId, Username};

/// 身份实体
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// 用户唯一ID
    pub id: UserId,
    /// 登录名（唯一）
    pub username: Username,
    /// 显示名称
    pub display_name: String,
    /// 密码哈希
    pub credential_hash: PasswordHash,
    /// 创建时间
    pub created_at: Timestamp,
    /// 最近一次登出时间，早于它签发的 refresh 令牌全部失效
    pub logout_at: Option<Timestamp>,
}

impl Identity {
    /// 注册新身份
    pub fn register(
        id: UserId,
        username: Username,
        display_name: impl Into<String>,
        credential_hash: PasswordHash,
        now: Timestamp,
    ) -> DomainResult<Self> {
        let display_name = AccountRules::validate_display_name(&display_name.into())?;

        Ok(Self {
            id,
            username,
            display_name,
            credential_hash,
            created_at: now,
            logout_at: None,
        })
    }

    /// 记录登出时间
    pub fn record_logout(&mut self, at: Timestamp) {
        self.logout_at = Some(at);
    }

    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            identity_id: self.id,
            display_name: self.display_name.clone(),
        }
    }
}
