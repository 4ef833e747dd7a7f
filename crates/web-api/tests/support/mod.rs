#![allow(dead_code)]

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use application::{Clock, ManualClock};
use config::AuthSettings;
use futures_util::{SinkExt, StreamExt};
use infrastructure::{BcryptPasswordHasher, InMemoryUserDirectory};
use reqwest::{header::SET_COOKIE, Client, Response};
use serde_json::{json, Value};
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message as WsFrame},
    MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState, CookiePolicy, StateParts, ACCESS_COOKIE, REFRESH_COOKIE};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 跑在 127.0.0.1 随机端口上的完整应用
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub state: AppState,
    _shutdown: oneshot::Sender<()>,
}

/// 登录后拿到的两个令牌
#[derive(Debug, Clone)]
pub struct Tokens {
    pub user_id: String,
    pub access: String,
    pub refresh: String,
}

impl Tokens {
    pub fn cookie_header(&self) -> String {
        format!("{ACCESS_COOKIE}={}; {REFRESH_COOKIE}={}", self.access, self.refresh)
    }
}

pub fn auth_settings() -> AuthSettings {
    AuthSettings {
        access_secret: "integration-access-secret".into(),
        access_ttl: Duration::from_secs(15 * 60),
        refresh_secret: "integration-refresh-secret".into(),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
    }
}

pub async fn spawn_app() -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let directory = Arc::new(InMemoryUserDirectory::new());

    let state = AppState::new(StateParts {
        user_directory: directory.clone(),
        password_hasher: Arc::new(BcryptPasswordHasher::new(Some(4))),
        clock: clock.clone() as Arc<dyn Clock>,
        auth: auth_settings(),
        cookies: CookiePolicy::default(),
        room_capacity: 256,
    })
    .expect("build app state");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = router(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestApp {
        addr,
        client: Client::new(),
        clock,
        directory,
        state,
        _shutdown: shutdown_tx,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/api/v1/ws", self.addr)
    }

    pub async fn register(&self, username: &str, display_name: &str) -> Tokens {
        let response = self
            .client
            .post(self.url("/api/v1/auth/register"))
            .json(&json!({
                "username": username,
                "display_name": display_name,
                "password": "secret-pass"
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(response.status(), 201, "register {username}");
        tokens_from(response).await
    }

    pub async fn login(&self, username: &str) -> Tokens {
        let response = self
            .client
            .post(self.url("/api/v1/auth/login"))
            .json(&json!({"username": username, "password": "secret-pass"}))
            .send()
            .await
            .expect("login request");
        assert_eq!(response.status(), 200, "login {username}");
        tokens_from(response).await
    }

    pub async fn get_with_cookies(&self, path: &str, cookies: &str) -> Response {
        self.client
            .get(self.url(path))
            .header("cookie", cookies)
            .send()
            .await
            .expect("get request")
    }

    pub async fn connect_ws(&self, tokens: &Tokens) -> WsClient {
        let mut request = self.ws_url().into_client_request().expect("ws request");
        request.headers_mut().insert(
            "cookie",
            HeaderValue::from_str(&tokens.cookie_header()).expect("cookie header"),
        );
        let (stream, _response) = connect_async(request).await.expect("ws connect");
        stream
    }
}

async fn tokens_from(response: Response) -> Tokens {
    let cookies = set_cookies(&response);
    let body: Value = response.json().await.expect("auth body");

    let access = body["access_token"].as_str().expect("access_token").to_owned();
    let refresh = body["refresh_token"].as_str().expect("refresh_token").to_owned();
    assert_eq!(cookies.get(ACCESS_COOKIE), Some(&access));
    assert_eq!(cookies.get(REFRESH_COOKIE), Some(&refresh));

    Tokens {
        user_id: body["user"]["id"].as_str().expect("user id").to_owned(),
        access,
        refresh,
    }
}

/// 解析响应里的 `Set-Cookie`，只保留名称和值
pub fn set_cookies(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_owned(), value.trim().to_owned()))
        .collect()
}

/// 读取下一个 JSON 事件，跳过控制帧
pub async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("ws error");
        match frame {
            WsFrame::Text(text) => return serde_json::from_str(text.as_str()).expect("json event"),
            WsFrame::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// 读取事件直到名称匹配，返回途中跳过的事件和匹配的事件
pub async fn events_until(ws: &mut WsClient, name: &str) -> (Vec<Value>, Value) {
    let mut skipped = Vec::new();
    loop {
        let event = next_event(ws).await;
        if event["event"] == name {
            return (skipped, event);
        }
        skipped.push(event);
    }
}

/// 读取直到收到关闭帧，返回关闭码和原因
pub async fn close_frame(ws: &mut WsClient) -> (u16, String) {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended before close")
            .expect("ws error");
        if let WsFrame::Close(Some(frame)) = frame {
            return (u16::from(frame.code), frame.reason.as_str().to_owned());
        }
    }
}

pub async fn send_event(ws: &mut WsClient, event: Value) {
    ws.send(WsFrame::text(event.to_string())).await.expect("send frame");
}

/// 把几条事件一次性写出，服务端在同一批数据里读到它们
pub async fn send_batch(ws: &mut WsClient, events: Vec<Value>) {
    for event in events {
        ws.feed(WsFrame::text(event.to_string())).await.expect("queue frame");
    }
    ws.flush().await.expect("flush frames");
}
