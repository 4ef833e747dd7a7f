//! 聊天核心领域模型
//!
//! 包含身份、令牌声明、消息、在线名册等核心实体，以及吊销规则
//! 和接收端历史记录的去重逻辑。

pub mod business_rules;
pub mod credential;
pub mod errors;
pub mod events;
pub mod history;
pub mod message;
pub mod repositories;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use business_rules::*;
pub use credential::*;
pub use errors::*;
pub use events::*;
pub use history::*;
pub use message::*;
pub use repositories::*;
pub use user::*;
pub use value_objects::*;
