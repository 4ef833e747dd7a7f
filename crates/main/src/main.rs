//! 主应用程序入口
//!
//! 加载配置，组装用户目录、令牌服务与在线名册，启动 Axum Web API 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{Clock, PasswordHasher, PresenceRegistry, SystemClock};
use config::AppConfig;
use domain::UserDirectory;
use infrastructure::{BcryptPasswordHasher, InMemoryUserDirectory};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, CookiePolicy, StateParts};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    // 缺少密钥或有效期时直接退出
    let auth = config
        .auth
        .resolve()
        .context("token configuration is incomplete")?;
    tracing::debug!(?auth, "token settings resolved");

    let user_directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new());
    let password_hasher: Arc<dyn PasswordHasher> =
        Arc::new(BcryptPasswordHasher::from_config(&config.password));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState::new(StateParts {
        user_directory,
        password_hasher,
        clock,
        auth,
        cookies: CookiePolicy::from(&config.cookies),
        room_capacity: config.presence.room_capacity,
    })
    .context("failed to build application state")?;
    let presence = state.presence.clone();

    let app = router(state);
    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;

    tracing::info!("聊天服务启动在 http://{}", bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(presence))
        .await?;

    tracing::info!("服务已停止");

    Ok(())
}

/// 收到 Ctrl-C 后先关闭所有 WebSocket 连接，已升级的连接不会自行结束
async fn shutdown_signal(presence: Arc<PresenceRegistry>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested, closing live connections");
    presence.shutdown().await;
}
