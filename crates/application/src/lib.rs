//! 应用层实现。
//!
//! 这里提供令牌签发与校验、会话网关、在线名册与消息路由，
//! 以及对外部适配器（用户目录、密码哈希、时钟）的抽象。

pub mod broadcaster;
pub mod clock;
pub mod error;
pub mod password;
pub mod presence;
pub mod router;
pub mod services;
pub mod session;
pub mod token;

pub use broadcaster::{Audience, RoomBroadcaster, RoomEvent, RoomStream};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ApplicationError;
pub use password::{PasswordHasher, PasswordHasherError};
pub use presence::{CloseReason, CloseSender, PresenceRegistry, Registration};
pub use router::{DeliveryReport, MessageRouter};
pub use services::{
    AuthenticateRequest, RegisterRequest, UserService, UserServiceDependencies,
};
pub use session::{AcceptedSession, GateDecision, RejectReason, SessionGate};
pub use token::{IssuedToken, TokenError, TokenPair, TokenService};
