//! 会话提取器
//!
//! HTTP 接口和 WebSocket 握手都通过 `Session` 走同一个会话网关。
//! 凭证优先取 Cookie，没有或校验不过时退回到请求头：访问令牌用
//! `Authorization: Bearer`，刷新令牌用 `X-Refresh-Token`。

use application::{AcceptedSession, GateDecision, RejectReason, TokenService};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use domain::{AccessClaim, Identity, RefreshClaim};

use crate::cookies::{ACCESS_COOKIE, REFRESH_COOKIE, REFRESH_HEADER};
use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;

/// 请求携带的凭证候选，Cookie 在前、请求头在后
///
/// Cookie 里的令牌校验不过（比如过期的旧 Cookie）时，退回到请求头里的同类令牌。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access: Vec<String>,
    pub refresh: Vec<String>,
}

impl Credentials {
    pub fn extract(jar: &CookieJar, headers: &HeaderMap) -> Self {
        let bearer = header_value(headers, AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer ").map(str::to_owned));

        Self {
            access: candidates(cookie_value(jar, ACCESS_COOKIE), bearer),
            refresh: candidates(
                cookie_value(jar, REFRESH_COOKIE),
                header_value(headers, REFRESH_HEADER),
            ),
        }
    }

    /// 第一个通过校验的访问令牌
    pub fn access_claim(&self, tokens: &TokenService) -> Option<(&str, AccessClaim)> {
        first_verified(&self.access, |token| tokens.verify_access(token))
    }

    /// 第一个通过校验的刷新令牌；是否已被登出吊销由会话网关判断
    pub fn refresh_claim(&self, tokens: &TokenService) -> Option<(&str, RefreshClaim)> {
        first_verified(&self.refresh, |token| tokens.verify_refresh(token))
    }
}

fn candidates(cookie: Option<String>, header: Option<String>) -> Vec<String> {
    let mut found: Vec<String> = cookie
        .into_iter()
        .chain(header)
        .filter(|token| !token.is_empty())
        .collect();
    found.dedup();
    found
}

fn first_verified<'a, T>(
    candidates: &'a [String],
    verify: impl Fn(&str) -> Option<T>,
) -> Option<(&'a str, T)> {
    candidates
        .iter()
        .find_map(|token| verify(token).map(|claim| (token.as_str(), claim)))
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_owned())
}

/// 通过会话网关的请求
///
/// `jar` 里可能带着静默轮换出的新访问令牌，处理函数需要把它放进响应。
#[derive(Debug)]
pub struct Session {
    pub identity: Identity,
    pub jar: CookieJar,
}

/// 会话网关拒绝或出错时的响应
#[derive(Debug)]
pub enum SessionRejection {
    /// 凭证被拒绝，同时清除客户端的两个 Cookie
    Rejected { reason: RejectReason, jar: CookieJar },
    Failed(ApiError),
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self {
            SessionRejection::Rejected { reason, jar } => {
                let status = match reason {
                    RejectReason::IdentityMissing => StatusCode::NOT_FOUND,
                    RejectReason::Unauthenticated | RejectReason::Revoked => {
                        StatusCode::UNAUTHORIZED
                    }
                };
                let body = ErrorBody {
                    code: reason.as_str().to_owned(),
                    message: match reason {
                        RejectReason::Unauthenticated => "no valid credential".to_owned(),
                        RejectReason::Revoked => "credential revoked by logout".to_owned(),
                        RejectReason::IdentityMissing => "identity no longer exists".to_owned(),
                    },
                };
                (status, jar, Json(body)).into_response()
            }
            SessionRejection::Failed(err) => err.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = SessionRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let credentials = Credentials::extract(&jar, &parts.headers);

        let access = credentials.access_claim(&state.tokens).map(|(token, _)| token);
        let refresh = credentials
            .refresh_claim(&state.tokens)
            .map(|(token, _)| token);

        let decision = state
            .session_gate
            .authorize(access, refresh)
            .await
            .map_err(|err| SessionRejection::Failed(err.into()))?;

        match decision {
            GateDecision::Accepted(AcceptedSession {
                identity,
                rotated_access,
            }) => {
                let jar = match rotated_access {
                    Some(issued) => jar.add(state.cookies.access_cookie(&issued)),
                    None => jar,
                };
                Ok(Session { identity, jar })
            }
            GateDecision::Rejected(reason) => Err(SessionRejection::Rejected {
                reason,
                jar: state.cookies.cleared(jar),
            }),
        }
    }
}
