mod support;

use serde_json::{json, Value};
use support::{set_cookies, spawn_app};
use web_api::{ACCESS_COOKIE, REFRESH_COOKIE, REFRESH_HEADER};

#[tokio::test]
async fn register_login_and_session_round_trip() {
    let app = spawn_app().await;

    let registered = app.register("ana", "Ana").await;
    let session = app
        .get_with_cookies("/api/v1/session", &registered.cookie_header())
        .await;
    assert_eq!(session.status(), 200);
    // 访问令牌仍然有效，不需要轮换
    assert!(set_cookies(&session).get(ACCESS_COOKIE).is_none());
    let body: Value = session.json().await.unwrap();
    assert_eq!(body["user"]["display_name"], "Ana");
    assert_eq!(body["user"]["id"], registered.user_id.as_str());

    let logged_in = app.login("ana").await;
    assert_eq!(logged_in.user_id, registered.user_id);
}

#[tokio::test]
async fn duplicate_registration_and_bad_login_are_rejected() {
    let app = spawn_app().await;
    app.register("ana", "Ana").await;

    let duplicate = app
        .client
        .post(app.url("/api/v1/auth/register"))
        .json(&json!({"username": "ana", "display_name": "Other", "password": "secret-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 409);

    let invalid = app
        .client
        .post(app.url("/api/v1/auth/register"))
        .json(&json!({"username": "x", "display_name": "X", "password": "secret-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);

    let bad_login = app
        .client
        .post(app.url("/api/v1/auth/login"))
        .json(&json!({"username": "ana", "password": "wrong-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_login.status(), 401);
}

#[tokio::test]
async fn missing_credentials_are_unauthenticated() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/api/v1/session"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.get(ACCESS_COOKIE).map(String::as_str), Some(""));
    assert_eq!(cookies.get(REFRESH_COOKIE).map(String::as_str), Some(""));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "unauthenticated");
}

/// 访问令牌过期、刷新令牌有效时静默签发新的访问令牌
#[tokio::test]
async fn expired_access_is_silently_rotated() {
    let app = spawn_app().await;
    let tokens = app.register("ana", "Ana").await;

    app.clock.advance(chrono::Duration::minutes(16));

    let response = app
        .get_with_cookies("/api/v1/session", &tokens.cookie_header())
        .await;
    assert_eq!(response.status(), 200);

    let cookies = set_cookies(&response);
    let rotated = cookies.get(ACCESS_COOKIE).cloned().expect("rotated access cookie");
    assert_ne!(rotated, tokens.access);
    assert!(cookies.get(REFRESH_COOKIE).is_none());

    // 新的访问令牌单独即可通过
    let follow_up = app
        .client
        .get(app.url("/api/v1/session"))
        .bearer_auth(&rotated)
        .send()
        .await
        .unwrap();
    assert_eq!(follow_up.status(), 200);
}

/// 登出之前签发的刷新令牌失效，之后重新登录签发的仍然有效
#[tokio::test]
async fn logout_revokes_earlier_refresh_tokens() {
    let app = spawn_app().await;
    let before_logout = app.register("ana", "Ana").await;

    app.clock.advance(chrono::Duration::seconds(1));
    let logout = app
        .client
        .post(app.url("/api/v1/auth/logout"))
        .header("cookie", before_logout.cookie_header())
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), 204);
    let cleared = set_cookies(&logout);
    assert_eq!(cleared.get(REFRESH_COOKIE).map(String::as_str), Some(""));

    app.clock.advance(chrono::Duration::seconds(1));
    let after_logout = app.login("ana").await;

    // 访问令牌过期后只剩刷新令牌起作用
    app.clock.advance(chrono::Duration::minutes(16));

    let revoked = app
        .client
        .get(app.url("/api/v1/session"))
        .header(REFRESH_HEADER, &before_logout.refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(revoked.status(), 401);
    let body: Value = revoked.json().await.unwrap();
    assert_eq!(body["code"], "revoked");

    let honored = app
        .client
        .get(app.url("/api/v1/session"))
        .header(REFRESH_HEADER, &after_logout.refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(honored.status(), 200);
    assert!(set_cookies(&honored).contains_key(ACCESS_COOKIE));
}

#[tokio::test]
async fn logout_without_credentials_still_succeeds() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/v1/auth/logout"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn deleted_identity_is_reported_as_missing() {
    let app = spawn_app().await;
    let tokens = app.register("ana", "Ana").await;

    let id = tokens.user_id.parse::<uuid::Uuid>().unwrap();
    app.directory.remove(domain::UserId::from(id)).await;

    let response = app
        .get_with_cookies("/api/v1/session", &tokens.cookie_header())
        .await;
    assert_eq!(response.status(), 404);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.get(ACCESS_COOKIE).map(String::as_str), Some(""));
}

#[tokio::test]
async fn profile_and_roster_require_a_session() {
    let app = spawn_app().await;
    let ana = app.register("ana", "Ana").await;
    let bob = app.register("bob", "Bob").await;

    let anonymous = app
        .client
        .get(app.url(&format!("/api/v1/users/{}", bob.user_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 401);

    let profile = app
        .get_with_cookies(
            &format!("/api/v1/users/{}", bob.user_id),
            &ana.cookie_header(),
        )
        .await;
    assert_eq!(profile.status(), 200);
    let body: Value = profile.json().await.unwrap();
    assert_eq!(body["display_name"], "Bob");
    assert_eq!(body["online"], false);

    let unknown = app
        .get_with_cookies(
            &format!("/api/v1/users/{}", uuid::Uuid::new_v4()),
            &ana.cookie_header(),
        )
        .await;
    assert_eq!(unknown.status(), 404);

    let roster = app
        .get_with_cookies("/api/v1/roster", &ana.cookie_header())
        .await;
    assert_eq!(roster.status(), 200);
    let body: Value = roster.json().await.unwrap();
    assert_eq!(body, json!([]));
}

/// Cookie 里是校验不过的旧令牌时，使用请求头里的有效令牌
#[tokio::test]
async fn stale_cookie_does_not_hide_valid_bearer() {
    let app = spawn_app().await;
    let tokens = app.register("ana", "Ana").await;

    let response = app
        .client
        .get(app.url("/api/v1/session"))
        .header("cookie", format!("{ACCESS_COOKIE}=stale-token"))
        .bearer_auth(&tokens.access)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["id"], tokens.user_id.as_str());
}
