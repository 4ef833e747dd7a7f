//! 基础设施层实现。
//!
//! 提供用户目录、密码哈希等适配器，实现应用/领域层定义的接口。

pub mod directory;
pub mod password;

pub use directory::InMemoryUserDirectory;
pub use password::BcryptPasswordHasher;
