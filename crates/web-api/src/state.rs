use std::sync::Arc;

use application::{
    Clock, MessageRouter, PasswordHasher, PresenceRegistry, RoomBroadcaster, SessionGate,
    TokenError, TokenService, UserService, UserServiceDependencies,
};
use config::AuthSettings;
use domain::UserDirectory;

use crate::cookies::CookiePolicy;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub session_gate: Arc<SessionGate>,
    pub tokens: Arc<TokenService>,
    pub presence: Arc<PresenceRegistry>,
    pub message_router: Arc<MessageRouter>,
    pub clock: Arc<dyn Clock>,
    pub cookies: CookiePolicy,
}

/// 组装 `AppState` 所需的外部依赖
pub struct StateParts {
    pub user_directory: Arc<dyn UserDirectory>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    pub auth: AuthSettings,
    pub cookies: CookiePolicy,
    pub room_capacity: usize,
}

impl AppState {
    pub fn new(parts: StateParts) -> Result<Self, TokenError> {
        let tokens = Arc::new(TokenService::new(&parts.auth, parts.clock.clone())?);
        let room = Arc::new(RoomBroadcaster::new(parts.room_capacity));
        let presence = Arc::new(PresenceRegistry::new(room.clone()));

        let user_service = Arc::new(UserService::new(UserServiceDependencies {
            user_directory: parts.user_directory.clone(),
            password_hasher: parts.password_hasher,
            clock: parts.clock.clone(),
            presence: presence.clone(),
        }));

        Ok(Self {
            user_service,
            session_gate: Arc::new(SessionGate::new(tokens.clone(), parts.user_directory)),
            tokens,
            message_router: Arc::new(MessageRouter::new(presence.clone(), room)),
            presence,
            clock: parts.clock,
            cookies: parts.cookies,
        })
    }
}
