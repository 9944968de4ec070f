//! App state: configuration and the access service.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use doorward_access::{AccessCache, AccessService, LogNotifier};
use doorward_core::constants::{
    DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_GRACE_SECS,
};
use doorward_core::error::{DoorwardError, Result};
use doorward_store::{MemoryStore, StoreSnapshot};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Server configuration, usually read from the environment.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Listening port (`PORT`)
    pub port: u16,
    /// Bind address (`BIND_ADDR`)
    pub bind_addr: String,
    /// libSQL/Turso URL (`DATABASE_URL`)
    pub database_url: Option<String>,
    /// libSQL auth token (`DATABASE_AUTH_TOKEN`)
    pub database_auth_token: Option<String>,
    /// JSON snapshot for the memory store (`SEED_FILE`)
    pub seed_file: Option<PathBuf>,
    /// Push region (`NOTIFY_REGION`, falling back to `AWS_REGION`)
    pub notify_region: Option<String>,
    /// Greet granted users by name (`INCLUDE_DISPLAY_NAME`)
    pub include_display_name: bool,
    /// Per-request timeout (`REQUEST_TIMEOUT_SECS`)
    pub request_timeout: Duration,
    /// Background drain on shutdown (`SHUTDOWN_GRACE_SECS`)
    pub shutdown_grace: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_addr: DEFAULT_BIND_ADDR.into(),
            database_url: None,
            database_auth_token: None,
            seed_file: None,
            notify_region: None,
            include_display_name: false,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl ApiConfig {
    /// Reads the configuration from the environment, loading `.env` first.
    ///
    /// # Errors
    ///
    /// `DoorwardError::Config` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT)?,
            bind_addr: env_opt("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            database_url: env_opt("DATABASE_URL"),
            database_auth_token: env_opt("DATABASE_AUTH_TOKEN"),
            seed_file: env_opt("SEED_FILE").map(PathBuf::from),
            notify_region: env_opt("NOTIFY_REGION").or_else(|| env_opt("AWS_REGION")),
            include_display_name: env_opt("INCLUDE_DISPLAY_NAME")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            shutdown_grace: Duration::from_secs(env_parse(
                "SHUTDOWN_GRACE_SECS",
                DEFAULT_SHUTDOWN_GRACE_SECS,
            )?),
        })
    }

    /// `bind_addr:port`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env_opt(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| DoorwardError::Config(format!("{}={:?}: {}", name, raw, e))),
    }
}

/// Shared request state.
pub struct AppState {
    /// Server configuration
    pub config: ApiConfig,
    /// The decision engine
    pub service: AccessService,
    /// Process start, for `/health`
    pub started_at: Instant,
}

impl AppState {
    /// Wraps an already-built service.
    pub fn new(config: ApiConfig, service: AccessService) -> Self {
        Self {
            config,
            service,
            started_at: Instant::now(),
        }
    }

    /// Builds the store, cache and service described by `config`.
    ///
    /// `DATABASE_URL` selects the libSQL gateway (feature `turso`); otherwise
    /// the memory store is seeded from `SEED_FILE`, or left empty.
    pub async fn from_config(config: ApiConfig) -> Result<Arc<Self>> {
        let cache = Arc::new(AccessCache::new());
        let notifier = Arc::new(LogNotifier::new(config.notify_region.clone()));

        #[cfg(feature = "turso")]
        if let Some(url) = &config.database_url {
            let token = config.database_auth_token.as_deref().unwrap_or_default();
            let store = Arc::new(doorward_store::SqlStore::connect_remote(url, token).await?);
            let service = AccessService::new(cache, store.clone(), store).with_notifier(notifier);
            return Ok(Arc::new(Self::new(config, service)));
        }

        #[cfg(not(feature = "turso"))]
        if config.database_url.is_some() {
            warn!("DATABASE_URL is set but libSQL support is not compiled in; ignoring it");
        }

        let store = match &config.seed_file {
            Some(path) => MemoryStore::from_snapshot(StoreSnapshot::load(path).await?)?,
            None => {
                warn!("No SEED_FILE or DATABASE_URL, starting with an empty schedule store");
                MemoryStore::new()
            }
        };
        info!(stats = ?store.stats(), "Memory schedule store ready");

        let store = Arc::new(store);
        let service = AccessService::new(cache, store.clone(), store).with_notifier(notifier);
        Ok(Arc::new(Self::new(config, service)))
    }
}
