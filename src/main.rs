mod config;
mod routes;
mod services;
mod state;
mod telegram;

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{BotConfig, ConfigError};
use crate::services::controller::Controller;
use crate::telegram::types::TelegramError;
use crate::telegram::{BotApi, TelegramClient};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("telegram client: {0}")]
    Client(#[from] TelegramError),
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },
    #[error("server failed: {0}")]
    Serve(std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("ignoring unreadable .env file: {e}");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gridmark exiting");
            ExitCode::FAILURE
        }
    }
}

/// Point the platform at `{APP_URL}/{WEBHOOK_SECRET}` when `APP_URL` is set.
/// Failure is logged only; the endpoint still serves whatever webhook is
/// already configured.
async fn register_webhook(bot: &dyn BotApi, config: &BotConfig) {
    let Some(url) = config.webhook_url() else {
        tracing::info!("APP_URL not set; skipping webhook registration");
        return;
    };
    match bot.set_webhook(&url).await {
        Ok(()) => tracing::info!(app_url = ?config.app_url, "webhook registered"),
        Err(e) => tracing::warn!(error = %e, "webhook registration failed"),
    }
}

async fn run() -> Result<(), StartupError> {
    let config = BotConfig::from_env()?;
    let bot: Arc<dyn BotApi> = Arc::new(TelegramClient::new(
        config.token.clone(),
        config.api_base_url.clone(),
        config.timeouts,
    )?);

    register_webhook(bot.as_ref(), &config).await;

    let (state, updates) = state::AppState::new(bot, config.session_capacity, config.queue_capacity);
    let _dispatcher = services::dispatch::spawn_dispatcher(Controller::from_state(&state), updates);

    let app = routes::app(state, &config.webhook_secret);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| StartupError::Bind { port, source })?;

    tracing::info!(%port, "gridmark listening");
    axum::serve(listener, app).await.map_err(StartupError::Serve)
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
