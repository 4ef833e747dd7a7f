//! 统一配置中心
//!
//! 提供应用的全局配置管理，按以下顺序合并（后者覆盖前者）：
//! - 内置默认值
//! - `APP_CONFIG_FILE` 指向的配置文件（toml / yaml / json）
//! - `APP_` 前缀的环境变量，`__` 表示嵌套，例如 `APP_SERVER__PORT`
//! - 兼容旧部署的环境变量：`JWT_SESSION_SECRET`、`JWT_SESSION_EXP`、
//!   `JWT_REFRESH_SECRET`、`JWT_REFRESH_EXP`、`PORT`
//!
//! 令牌密钥与有效期没有默认值，缺失时 [`AuthConfig::resolve`] 返回错误，
//! 进程应当拒绝启动。

use std::fmt;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[validate(nested)]
    pub server: ServerConfig,
    /// 令牌配置
    #[serde(default)]
    pub auth: AuthConfig,
    /// Cookie 配置
    #[serde(default)]
    pub cookies: CookieConfig,
    /// 在线状态配置
    #[serde(default)]
    #[validate(nested)]
    pub presence: PresenceConfig,
    /// 密码哈希配置
    #[serde(default)]
    #[validate(nested)]
    pub password: PasswordConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 令牌配置（原始值，尚未校验）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_ttl: Option<TtlSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_ttl: Option<TtlSpec>,
}

/// 有效期写法：纯数字表示秒，或 `15m` / `7d` 这类带单位的文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TtlSpec {
    Seconds(u64),
    Text(String),
}

impl TtlSpec {
    pub fn to_duration(&self) -> Result<Duration, ConfigError> {
        match self {
            TtlSpec::Seconds(0) => Err(ConfigError::InvalidTtl("0".to_string())),
            TtlSpec::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            TtlSpec::Text(text) => parse_ttl(text),
        }
    }
}

/// 校验通过的令牌配置
#[derive(Clone)]
pub struct AuthSettings {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("access_secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_secret", &"[REDACTED]")
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl AuthConfig {
    /// 校验并解析令牌配置，任何一项缺失都视为启动失败
    pub fn resolve(&self) -> Result<AuthSettings, ConfigError> {
        let access_secret = required_secret(&self.access_secret, "auth.access_secret")?;
        let refresh_secret = required_secret(&self.refresh_secret, "auth.refresh_secret")?;
        let access_ttl = self
            .access_ttl
            .as_ref()
            .ok_or(ConfigError::Missing("auth.access_ttl"))?
            .to_duration()?;
        let refresh_ttl = self
            .refresh_ttl
            .as_ref()
            .ok_or(ConfigError::Missing("auth.refresh_ttl"))?
            .to_duration()?;

        Ok(AuthSettings {
            access_secret,
            access_ttl,
            refresh_secret,
            refresh_ttl,
        })
    }
}

fn required_secret(value: &Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(secret) if !secret.trim().is_empty() => Ok(secret.clone()),
        _ => Err(ConfigError::Missing(field)),
    }
}

/// Cookie 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieConfig {
    /// 生产环境下应为 true，refresh cookie 只通过 HTTPS 传输
    #[serde(default)]
    pub secure: bool,
}

/// 在线状态配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PresenceConfig {
    /// 房间广播通道容量
    #[validate(range(min = 1))]
    pub room_capacity: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self { room_capacity: 256 }
    }
}

/// 密码哈希配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PasswordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 4, max = 31))]
    pub bcrypt_cost: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 3000,
            },
            auth: AuthConfig::default(),
            cookies: CookieConfig::default(),
            presence: PresenceConfig::default(),
            password: PasswordConfig::default(),
        }
    }
}

impl AppConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的顺序加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                figment = figment.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                figment = figment.merge(Json::file(path));
            } else {
                figment = figment.merge(Toml::file(path));
            }
        }
        figment = figment
            .merge(Env::prefixed("APP_").split("__"))
            .merge(legacy_env());

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment
            .extract()
            .map_err(|err| ConfigError::Load(Box::new(err)))?;
        config.validate()?;
        Ok(config)
    }
}

fn legacy_env() -> Env {
    Env::raw()
        .only(&[
            "JWT_SESSION_SECRET",
            "JWT_SESSION_EXP",
            "JWT_REFRESH_SECRET",
            "JWT_REFRESH_EXP",
            "PORT",
        ])
        .map(|key| legacy_key(key.as_str()).into())
}

fn legacy_key(key: &str) -> String {
    match key.to_ascii_uppercase().as_str() {
        "JWT_SESSION_SECRET" => "auth.access_secret".to_string(),
        "JWT_SESSION_EXP" => "auth.access_ttl".to_string(),
        "JWT_REFRESH_SECRET" => "auth.refresh_secret".to_string(),
        "JWT_REFRESH_EXP" => "auth.refresh_ttl".to_string(),
        "PORT" => "server.port".to_string(),
        _ => key.to_string(),
    }
}

/// 解析 `30s`、`15m`、`2h`、`7d` 或纯秒数
pub fn parse_ttl(text: &str) -> Result<Duration, ConfigError> {
    let text = text.trim();
    let invalid = || ConfigError::InvalidTtl(text.to_string());

    let (digits, unit) = match text.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => text.split_at(idx),
        None => (text, "s"),
    };
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let multiplier = match unit.trim() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(invalid()),
    };
    if amount == 0 {
        return Err(invalid());
    }

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {0}")]
    Missing(&'static str),
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
