//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP / WebSocket 请求委托给应用层：
//! 凭证经由 `Session` 提取器统一走会话网关，连接登记到在线名册，
//! 消息交给路由器投递。

mod auth;
mod cookies;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{Credentials, Session, SessionRejection};
pub use cookies::{CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE, REFRESH_HEADER};
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::{AppState, StateParts};
pub use ws_connection::{ConnectionPhase, WebSocketConnection};
