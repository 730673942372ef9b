use std::time::Duration;

use linkpulse_core::AppError;

pub const STORE_URL_VAR: &str = "LINKPULSE_STORE_URL";
pub const STORE_KEY_VAR: &str = "LINKPULSE_STORE_KEY";
pub const STORE_MAX_CONNECTIONS_VAR: &str = "LINKPULSE_STORE_MAX_CONNECTIONS";

/// Backend a store URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// PostgREST-style HTTP table API.
    Rest,
    /// Direct PostgreSQL connection.
    Postgres,
}

impl StoreKind {
    pub fn from_url(url: &str) -> Result<Self, AppError> {
        let scheme = url
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| AppError::ConfigError(format!("Store URL '{url}' has no scheme")))?;

        match scheme.as_str() {
            "http" | "https" => Ok(StoreKind::Rest),
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            other => Err(AppError::ConfigError(format!(
                "Unsupported store URL scheme '{other}': expected http(s) or postgres"
            ))),
        }
    }
}

/// Connection settings for the record store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub key: String,
    pub kind: StoreKind,
    pub max_connections: u32,
    pub request_timeout: Duration,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Result<Self, AppError> {
        let url = url.into();
        let key = key.into();
        if url.trim().is_empty() {
            return Err(AppError::ConfigError(format!("{STORE_URL_VAR} is empty")));
        }
        if key.trim().is_empty() {
            return Err(AppError::ConfigError(format!("{STORE_KEY_VAR} is empty")));
        }
        let kind = StoreKind::from_url(&url)?;

        Ok(Self {
            url,
            key,
            kind,
            max_connections: 5,
            request_timeout: Duration::from_secs(30),
        })
    }

    /// Read configuration from environment variables.
    ///
    /// - `LINKPULSE_STORE_URL` (required)
    /// - `LINKPULSE_STORE_KEY` (required)
    /// - `LINKPULSE_STORE_MAX_CONNECTIONS` (optional, defaults to 5)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let url = lookup(STORE_URL_VAR).ok_or_else(|| {
            AppError::ConfigError(format!("{STORE_URL_VAR} not set. Required to read link records."))
        })?;
        let key = lookup(STORE_KEY_VAR).ok_or_else(|| {
            AppError::ConfigError(format!("{STORE_KEY_VAR} not set. Required to read link records."))
        })?;

        let mut config = Self::new(url, key)?;

        if let Some(raw) = lookup(STORE_MAX_CONNECTIONS_VAR) {
            let parsed: u32 = raw.parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid {STORE_MAX_CONNECTIONS_VAR} '{raw}': must be a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(AppError::ConfigError(format!(
                    "{STORE_MAX_CONNECTIONS_VAR} must be at least 1"
                )));
            }
            config.max_connections = parsed;
        }

        Ok(config)
    }
}
