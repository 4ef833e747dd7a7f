mod user_service;

pub use user_service::{
    AuthenticateRequest, RegisterRequest, UserService, UserServiceDependencies,
};
