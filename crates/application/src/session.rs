//! 会话网关
//!
//! HTTP 请求与 WebSocket 握手共用的凭证判定。访问令牌有效即放行；
//! 否则尝试刷新令牌，未被吊销时签发新的访问令牌（静默轮换）。
//! 凭证问题一律表现为判定结果，只有用户目录故障才返回错误。

use std::sync::Arc;

use domain::{Identity, RevocationPolicy, UserDirectory, UserId};

use crate::error::ApplicationError;
use crate::token::{IssuedToken, TokenService};

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// 两个令牌都缺失或无效
    Unauthenticated,
    /// 刷新令牌签发早于最近一次登出
    Revoked,
    /// 令牌有效但身份已不存在
    IdentityMissing,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Unauthenticated => "unauthenticated",
            RejectReason::Revoked => "revoked",
            RejectReason::IdentityMissing => "identity-missing",
        }
    }
}

/// 放行结果；`rotated_access` 有值时调用方需要把新令牌交给客户端
#[derive(Debug, Clone)]
pub struct AcceptedSession {
    pub identity: Identity,
    pub rotated_access: Option<IssuedToken>,
}

#[derive(Debug, Clone)]
pub enum GateDecision {
    Accepted(AcceptedSession),
    Rejected(RejectReason),
}

pub struct SessionGate {
    tokens: Arc<TokenService>,
    directory: Arc<dyn UserDirectory>,
}

impl SessionGate {
    pub fn new(tokens: Arc<TokenService>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { tokens, directory }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub async fn authorize(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<GateDecision, ApplicationError> {
        if let Some(claim) = access.and_then(|token| self.tokens.verify_access(token)) {
            return Ok(match self.resolve(claim.subject_id).await? {
                Some(identity) => GateDecision::Accepted(AcceptedSession {
                    identity,
                    rotated_access: None,
                }),
                None => self.reject(claim.subject_id, RejectReason::IdentityMissing),
            });
        }

        let Some(claim) = refresh.and_then(|token| self.tokens.verify_refresh(token)) else {
            return Ok(GateDecision::Rejected(RejectReason::Unauthenticated));
        };

        let Some(identity) = self.resolve(claim.subject_id).await? else {
            return Ok(self.reject(claim.subject_id, RejectReason::IdentityMissing));
        };

        if !RevocationPolicy::is_honorable(claim.issued_at, identity.logout_at) {
            return Ok(self.reject(identity.id, RejectReason::Revoked));
        }

        let rotated = self.tokens.issue_access(identity.id)?;
        tracing::debug!(user_id = %identity.id, "access token rotated from refresh token");

        Ok(GateDecision::Accepted(AcceptedSession {
            identity,
            rotated_access: Some(rotated),
        }))
    }

    async fn resolve(&self, id: UserId) -> Result<Option<Identity>, ApplicationError> {
        Ok(self.directory.find_by_id(id).await?)
    }

    fn reject(&self, user_id: UserId, reason: RejectReason) -> GateDecision {
        tracing::warn!(user_id = %user_id, reason = reason.as_str(), "session rejected");
        GateDecision::Rejected(reason)
    }
}
