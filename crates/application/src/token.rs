//! 令牌签发与校验
//!
//! 访问令牌与刷新令牌使用各自的密钥与有效期签名（HS256）。
//! 校验失败的原因（格式错误、签名不符、种类不符、已过期）一律折叠为 `None`，
//! 调用方只知道校验没有通过。过期判断以注入的时钟为准。

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use config::AuthSettings;
use domain::{AccessClaim, RefreshClaim, Timestamp, TokenKind, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

/// JWT 载荷
#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: UserId,
    kind: TokenKind,
    iat: i64,
    /// 毫秒精度的签发时间，吊销比较使用它
    iat_ms: i64,
    /// 向上取整到秒，保证不早于 `exp_ms`
    exp: i64,
    /// 毫秒精度的过期时间，校验时使用它
    exp_ms: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("ttl out of range: {0:?}")]
    TtlOutOfRange(Duration),
}

/// 签发结果
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub ttl: Duration,
}

/// 登录 / 注册时一并签发的令牌对
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    chrono_ttl: chrono::Duration,
}

impl SigningKeys {
    fn new(secret: &str, ttl: Duration) -> Result<Self, TokenError> {
        let chrono_ttl =
            chrono::Duration::from_std(ttl).map_err(|_| TokenError::TtlOutOfRange(ttl))?;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            chrono_ttl,
        })
    }
}

/// 令牌服务
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(settings: &AuthSettings, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp 由下面的 check_expiry 按注入时钟判断
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            access: SigningKeys::new(&settings.access_secret, settings.access_ttl)?,
            refresh: SigningKeys::new(&settings.refresh_secret, settings.refresh_ttl)?,
            validation,
            clock,
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access.ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh.ttl
    }

    /// 签发访问令牌
    pub fn issue_access(&self, subject: UserId) -> Result<IssuedToken, TokenError> {
        self.issue(&self.access, TokenKind::Access, subject)
    }

    /// 签发刷新令牌
    pub fn issue_refresh(&self, subject: UserId) -> Result<IssuedToken, TokenError> {
        self.issue(&self.refresh, TokenKind::Refresh, subject)
    }

    pub fn issue_pair(&self, subject: UserId) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access(subject)?,
            refresh: self.issue_refresh(subject)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Option<AccessClaim> {
        self.verify(&self.access, TokenKind::Access, token)
            .map(|(subject_id, issued_at)| AccessClaim {
                subject_id,
                issued_at,
            })
    }

    pub fn verify_refresh(&self, token: &str) -> Option<RefreshClaim> {
        self.verify(&self.refresh, TokenKind::Refresh, token)
            .map(|(subject_id, issued_at)| RefreshClaim {
                subject_id,
                issued_at,
            })
    }

    fn issue(
        &self,
        keys: &SigningKeys,
        kind: TokenKind,
        subject: UserId,
    ) -> Result<IssuedToken, TokenError> {
        let issued_at = self.clock.now();
        let expires_at = issued_at
            .checked_add_signed(keys.chrono_ttl)
            .ok_or(TokenError::TtlOutOfRange(keys.ttl))?;
        let exp_ms = expires_at.timestamp_millis();

        let claims = TokenClaims {
            sub: subject,
            kind,
            iat: issued_at.timestamp(),
            iat_ms: issued_at.timestamp_millis(),
            exp: exp_ms.div_euclid(1000) + i64::from(exp_ms.rem_euclid(1000) != 0),
            exp_ms,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))?;

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
            ttl: keys.ttl,
        })
    }

    fn verify(
        &self,
        keys: &SigningKeys,
        kind: TokenKind,
        token: &str,
    ) -> Option<(UserId, Timestamp)> {
        if token.is_empty() {
            return None;
        }

        let claims = decode::<TokenClaims>(token, &keys.decoding, &self.validation)
            .map_err(|err| tracing::debug!(error = %err, ?kind, "token rejected"))
            .ok()?
            .claims;

        if claims.kind != kind || !self.check_expiry(claims.exp_ms) {
            return None;
        }

        let issued_at = chrono::Utc.timestamp_millis_opt(claims.iat_ms).single()?;
        Some((claims.sub, issued_at))
    }

    fn check_expiry(&self, exp_ms: i64) -> bool {
        self.clock.now().timestamp_millis() < exp_ms
    }
}
