use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use application::{ApplicationError, AuthenticateRequest, RegisterRequest};
use domain::{DomainError, Identity, RosterEntry, Timestamp, UserId};

use crate::{
    auth::{Credentials, Session},
    error::ApiError,
    state::AppState,
    ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    display_name: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct UserView {
    id: UserId,
    username: String,
    display_name: String,
    created_at: Timestamp,
}

impl From<&Identity> for UserView {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username.as_str().to_owned(),
            display_name: identity.display_name.clone(),
            created_at: identity.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    user: UserView,
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    user: UserView,
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    id: UserId,
    display_name: String,
    online: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/auth/logout", post(logout_user))
        .route("/session", get(current_session))
        .route("/users/{user_id}", get(user_profile))
        .route("/roster", get(roster))
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 签发令牌对并写入 Cookie
fn signed_in(
    state: &AppState,
    jar: CookieJar,
    identity: &Identity,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let pair = state
        .tokens
        .issue_pair(identity.id)
        .map_err(ApplicationError::from)?;

    let jar = state.cookies.with_pair(jar, &pair);
    Ok((
        jar,
        Json(AuthResponse {
            user: UserView::from(identity),
            access_token: pair.access.token,
            refresh_token: pair.refresh.token,
        }),
    ))
}

async fn register_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = state
        .user_service
        .register(RegisterRequest {
            username: payload.username,
            display_name: payload.display_name,
            password: payload.password,
        })
        .await?;

    let (jar, body) = signed_in(&state, jar, &identity)?;
    Ok((StatusCode::CREATED, jar, body))
}

async fn login_user(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = state
        .user_service
        .authenticate(AuthenticateRequest {
            username: payload.username,
            password: payload.password,
        })
        .await?;

    tracing::info!(user_id = %identity.id, "user logged in");
    signed_in(&state, jar, &identity)
}

/// 登出：记录登出时间、断开在线连接、清除 Cookie
///
/// 没有可用凭证时同样返回 204，客户端只需要知道凭证已被清除。
async fn logout_user(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let credentials = Credentials::extract(&jar, &headers);
    let subject = credentials
        .refresh_claim(&state.tokens)
        .map(|(_, claim)| claim.subject_id)
        .or_else(|| {
            credentials
                .access_claim(&state.tokens)
                .map(|(_, claim)| claim.subject_id)
        });

    if let Some(user_id) = subject {
        match state.user_service.logout(user_id).await {
            Ok(()) | Err(ApplicationError::Domain(DomainError::UserNotFound { .. })) => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok((StatusCode::NO_CONTENT, state.cookies.cleared(jar)))
}

async fn current_session(session: Session) -> impl IntoResponse {
    let body = SessionResponse {
        user: UserView::from(&session.identity),
    };
    (session.jar, Json(body))
}

async fn user_profile(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = UserId::from(user_id);
    let identity = state.user_service.profile(user_id).await?;
    let online = state.presence.is_online(user_id).await;

    Ok((
        session.jar,
        Json(ProfileResponse {
            id: identity.id,
            display_name: identity.display_name,
            online,
        }),
    ))
}

async fn roster(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    let snapshot: Vec<RosterEntry> = state.presence.snapshot().await;
    (session.jar, Json(snapshot))
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    session: Session,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Session { identity, jar } = session;
    let connection = WebSocketConnection::new(state, identity);
    (jar, ws.on_upgrade(move |socket| connection.run(socket)))
}
