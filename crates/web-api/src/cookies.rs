//! 凭证 Cookie
//!
//! 访问令牌放在客户端可读的 `__access`，刷新令牌放在 HttpOnly 的 `__refresh`。
//! 清除凭证即写入同名空值并设置 `Max-Age=0`。

use std::time::Duration as StdDuration;

use application::{IssuedToken, TokenPair};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use config::CookieConfig;
use time::Duration;

pub const ACCESS_COOKIE: &str = "__access";
pub const REFRESH_COOKIE: &str = "__refresh";
/// 没有 Cookie 的客户端用这个请求头携带刷新令牌
pub const REFRESH_HEADER: &str = "x-refresh-token";

#[derive(Debug, Clone, Copy, Default)]
pub struct CookiePolicy {
    /// refresh cookie 是否只经 HTTPS 发送
    pub secure: bool,
}

impl From<&CookieConfig> for CookiePolicy {
    fn from(config: &CookieConfig) -> Self {
        Self {
            secure: config.secure,
        }
    }
}

impl CookiePolicy {
    pub fn access_cookie(&self, issued: &IssuedToken) -> Cookie<'static> {
        Cookie::build((ACCESS_COOKIE, issued.token.clone()))
            .path("/")
            .max_age(max_age(issued.ttl))
            .build()
    }

    pub fn refresh_cookie(&self, issued: &IssuedToken) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, issued.token.clone()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(max_age(issued.ttl))
            .build()
    }

    pub fn clear_access_cookie(&self) -> Cookie<'static> {
        Cookie::build((ACCESS_COOKIE, ""))
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    }

    pub fn clear_refresh_cookie(&self) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, ""))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(Duration::ZERO)
            .build()
    }

    pub fn with_pair(&self, jar: CookieJar, pair: &TokenPair) -> CookieJar {
        jar.add(self.access_cookie(&pair.access))
            .add(self.refresh_cookie(&pair.refresh))
    }

    pub fn cleared(&self, jar: CookieJar) -> CookieJar {
        jar.add(self.clear_access_cookie())
            .add(self.clear_refresh_cookie())
    }
}

fn max_age(ttl: StdDuration) -> Duration {
    Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn issued(token: &str, secs: u64) -> IssuedToken {
        let now = Utc::now();
        IssuedToken {
            token: token.into(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(secs as i64),
            ttl: StdDuration::from_secs(secs),
        }
    }

    #[test]
    fn access_cookie_is_readable_by_scripts() {
        let cookie = CookiePolicy::default().access_cookie(&issued("a.b.c", 900));

        assert_eq!(cookie.name(), ACCESS_COOKIE);
        assert_eq!(cookie.value(), "a.b.c");
        assert_ne!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(900)));
    }

    #[test]
    fn refresh_cookie_is_http_only_and_lax() {
        let policy = CookiePolicy { secure: true };
        let cookie = policy.refresh_cookie(&issued("r.r.r", 604_800));

        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn cleared_cookies_are_empty_and_expired() {
        let jar = CookiePolicy::default().cleared(CookieJar::default());

        for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
            let cookie = jar.get(name).unwrap();
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }
}
