//! Bot configuration parsed from environment variables.
//!
//! Read once at startup. Parsing goes through a lookup closure so tests can
//! feed a map instead of mutating the process environment.

#[cfg(test)]
use std::collections::HashMap;

pub const DEFAULT_WEBHOOK_SECRET: &str = "secret-path";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPDATE_QUEUE_CAPACITY: usize = 256;

const RESERVED_PATHS: &[&str] = &["healthz"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    MissingVar { var: &'static str },
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
    #[error("invalid WEBHOOK_SECRET: must be a non-empty run of [A-Za-z0-9_.~-] other than a reserved path")]
    InvalidWebhookSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Bot authentication token.
    pub token: String,
    /// Path segment the webhook is served under.
    pub webhook_secret: String,
    /// Public base URL; when present the webhook is registered at startup.
    pub app_url: Option<String>,
    pub port: u16,
    pub api_base_url: String,
    pub timeouts: HttpTimeouts,
    pub queue_capacity: usize,
    /// Maximum live sessions; 0 means unbounded.
    pub session_capacity: usize,
}

impl BotConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `TG_TOKEN`
    ///
    /// Optional:
    /// - `WEBHOOK_SECRET`: default `secret-path`
    /// - `APP_URL`: no webhook registration when absent
    /// - `PORT`: default 8000
    /// - `TELEGRAM_API_BASE_URL`: default `https://api.telegram.org`
    /// - `TELEGRAM_REQUEST_TIMEOUT_SECS` / `TELEGRAM_CONNECT_TIMEOUT_SECS`: default 30 / 10
    /// - `UPDATE_QUEUE_CAPACITY`: default 256
    /// - `SESSION_CAPACITY`: default 0 (unbounded)
    ///
    /// # Errors
    ///
    /// Returns an error if the token is missing, `PORT` is not a port number,
    /// or the webhook secret cannot be used as a path segment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from a map of variables.
    ///
    /// # Errors
    ///
    /// Same as [`BotConfig::from_env`].
    #[cfg(test)]
    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("TG_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar { var: "TG_TOKEN" })?;

        let webhook_secret = lookup("WEBHOOK_SECRET").unwrap_or_else(|| DEFAULT_WEBHOOK_SECRET.to_string());
        if !is_valid_secret(&webhook_secret) {
            return Err(ConfigError::InvalidWebhookSecret);
        }

        let app_url = lookup("APP_URL")
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => DEFAULT_PORT,
        };

        let api_base_url = lookup("TELEGRAM_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let timeouts = HttpTimeouts {
            request_secs: parse_or(&lookup, "TELEGRAM_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_or(&lookup, "TELEGRAM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self {
            token,
            webhook_secret,
            app_url,
            port,
            api_base_url,
            timeouts,
            queue_capacity: parse_or(&lookup, "UPDATE_QUEUE_CAPACITY", DEFAULT_UPDATE_QUEUE_CAPACITY).max(1),
            session_capacity: parse_or(&lookup, "SESSION_CAPACITY", 0),
        })
    }

    /// Full webhook URL to register with the platform, if `APP_URL` is set.
    #[must_use]
    pub fn webhook_url(&self) -> Option<String> {
        self.app_url
            .as_deref()
            .map(|base| format!("{base}/{}", self.webhook_secret))
    }
}

/// The secret becomes a literal route segment, so it must not contain path
/// or route-syntax characters, or collide with fixed routes.
fn is_valid_secret(secret: &str) -> bool {
    !secret.is_empty()
        && !RESERVED_PATHS.contains(&secret)
        && secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
