//! 令牌声明
//!
//! 两种令牌都只携带主体与签发时间。服务端从不保存令牌，
//! 持有签名有效且未过期的令牌就是全部授权依据。

use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId};

/// 令牌种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// 短期访问令牌
    Access,
    /// 长期刷新令牌，仅用于换取新的访问令牌
    Refresh,
}

/// 访问令牌声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaim {
    pub subject_id: UserId,
    pub issued_at: Timestamp,
}

/// 刷新令牌声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClaim {
    pub subject_id: UserId,
    pub issued_at: Timestamp,
}
