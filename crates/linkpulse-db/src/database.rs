use std::str::FromStr;

use linkpulse_core::error::AppError;
use linkpulse_core::models::{RecordPage, RecordUpdate, SourceSpec};
use linkpulse_core::traits::RecordSource;
use reqwest::Client;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use url::Url;

use crate::config::{StoreConfig, StoreKind};
use crate::pg_source::PgSource;
use crate::rest_source::{RestSource, auth_headers};

/// Record store facade: owns the HTTP client or the connection pool and
/// vends one [`StoreSource`] per configured table.
#[derive(Clone)]
pub struct Store {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Rest { client: Client, api_base: Url },
    Postgres(PgPool),
}

impl Store {
    /// Prepare the backend selected by the URL scheme.
    ///
    /// No connection is opened here; the first source read reaches the store,
    /// so an unreachable store surfaces as failed sources.
    pub fn connect(config: &StoreConfig) -> Result<Self, AppError> {
        let backend = match config.kind {
            StoreKind::Rest => {
                let api_base = Url::parse(&config.url)
                    .map_err(|e| AppError::ConfigError(format!("Invalid store URL: {e}")))?;
                let client = Client::builder()
                    .default_headers(auth_headers(&config.key)?)
                    .timeout(config.request_timeout)
                    .build()
                    .map_err(|e| AppError::HttpError(e.to_string()))?;
                Backend::Rest { client, api_base }
            }
            StoreKind::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.request_timeout)
                    .connect_lazy_with(pg_options(config)?);
                Backend::Postgres(pool)
            }
        };

        tracing::debug!(kind = ?config.kind, "Record store configured");
        Ok(Self { backend })
    }

    /// Create a `Store` from an existing pool (useful for testing).
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    pub fn kind(&self) -> StoreKind {
        match self.backend {
            Backend::Rest { .. } => StoreKind::Rest,
            Backend::Postgres(_) => StoreKind::Postgres,
        }
    }

    /// Get a [`StoreSource`] for one configured table.
    pub fn source(&self, spec: &SourceSpec) -> Result<StoreSource, AppError> {
        match &self.backend {
            Backend::Rest { client, api_base } => Ok(StoreSource::Rest(RestSource::new(
                client.clone(),
                api_base,
                spec.clone(),
            )?)),
            Backend::Postgres(pool) => Ok(StoreSource::Postgres(PgSource::new(
                pool.clone(),
                spec.clone(),
            )?)),
        }
    }

    pub fn sources(&self, specs: &[SourceSpec]) -> Result<Vec<StoreSource>, AppError> {
        specs.iter().map(|spec| self.source(spec)).collect()
    }
}

/// The store key doubles as the password unless the URL carries one.
fn pg_options(config: &StoreConfig) -> Result<PgConnectOptions, AppError> {
    let options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| AppError::ConfigError(format!("Invalid PostgreSQL URL: {e}")))?;

    let has_password = Url::parse(&config.url)
        .map(|u| u.password().is_some())
        .unwrap_or(false);

    Ok(if has_password {
        options
    } else {
        options.password(&config.key)
    })
}

/// A record source on whichever backend the store uses.
#[derive(Clone)]
pub enum StoreSource {
    Rest(RestSource),
    Postgres(PgSource),
}

impl RecordSource for StoreSource {
    fn name(&self) -> &str {
        match self {
            StoreSource::Rest(s) => s.name(),
            StoreSource::Postgres(s) => s.name(),
        }
    }

    async fn count(&self) -> Result<u64, AppError> {
        match self {
            StoreSource::Rest(s) => s.count().await,
            StoreSource::Postgres(s) => s.count().await,
        }
    }

    async fn page(&self, offset: u64, limit: u64) -> Result<RecordPage, AppError> {
        match self {
            StoreSource::Rest(s) => s.page(offset, limit).await,
            StoreSource::Postgres(s) => s.page(offset, limit).await,
        }
    }

    async fn update(&self, id: &str, update: &RecordUpdate) -> Result<(), AppError> {
        match self {
            StoreSource::Rest(s) => s.update(id, update).await,
            StoreSource::Postgres(s) => s.update(id, update).await,
        }
    }
}
