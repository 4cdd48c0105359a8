//! Client configuration
//!
//! Loaded with figment: defaults, then an optional file (toml/yaml/json),
//! then `PRTG_` environment variables (`PRTG_RETRY__RETRIES=5`).

use common::{load_layered, LoggingConfig};
use prtg_cache::{EntityCache, FileCache, MemoryCache};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connection::{OnExhausted, RetryPolicy, Session};
use crate::error::{ClientError, Result};
use crate::query::{Credentials, DEFAULT_MAXIMUM};

/// Environment variable prefix of every setting
pub const ENV_PREFIX: &str = "PRTG_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Root URL of the server
    pub endpoint: String,
    pub username: String,
    pub password: Option<String>,
    /// Used instead of `password` when set
    pub passhash: Option<String>,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    /// Items per page for table queries
    pub page_size: usize,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: None,
            passhash: None,
            timeout_secs: 30,
            accept_invalid_certs: false,
            page_size: DEFAULT_MAXIMUM,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: u32,
    pub on_exhausted: OnExhausted,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_backoff_ms: 2000,
            multiplier: 2,
            on_exhausted: OnExhausted::Abort,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory of the temp cache file (file backend only)
    pub dir: Option<PathBuf>,
}

impl CacheConfig {
    pub fn build(&self) -> Result<Box<dyn EntityCache>> {
        Ok(match self.backend {
            CacheBackend::Memory => Box::new(MemoryCache::new()),
            CacheBackend::File => Box::new(FileCache::temporary(self.dir.as_deref())?),
        })
    }
}

impl ClientConfig {
    /// Defaults, then `path` if given, then `PRTG_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = load_layered(path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ClientError::Config("endpoint must be set".to_string()));
        }
        url::Url::parse(&self.endpoint)?;
        if self.username.trim().is_empty() {
            return Err(ClientError::Config("username must be set".to_string()));
        }
        if self.password.is_none() && self.passhash.is_none() {
            return Err(ClientError::Config(
                "either password or passhash must be set".to_string(),
            ));
        }
        if self.retry.multiplier == 0 {
            return Err(ClientError::Config(
                "retry.multiplier must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(ClientError::Config("page_size must be positive".to_string()));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.passhash, &self.password) {
            (Some(hash), _) => Ok(Credentials::PassHash(hash.clone())),
            (None, Some(password)) => Ok(Credentials::Password(password.clone())),
            (None, None) => Err(ClientError::Config(
                "either password or passhash must be set".to_string(),
            )),
        }
    }

    pub fn session(&self) -> Result<Session> {
        Ok(Session::new(
            self.endpoint.clone(),
            self.username.clone(),
            self.credentials()?,
        ))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(
            self.retry.retries,
            self.retry.initial_backoff_ms,
            self.retry.multiplier,
            self.retry.on_exhausted,
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
