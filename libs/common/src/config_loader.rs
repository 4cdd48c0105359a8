//! Configuration loading helper functions
//!
//! Files are picked by extension (`toml`, `yaml`/`yml`, `json`). Layered
//! loading merges, lowest priority first: the type's defaults, the file,
//! then prefixed environment variables.

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{CommonError, Result};

/// Separator of nested keys in environment variables (`PRTG_RETRY__RETRIES`)
pub const ENV_NESTING_SEPARATOR: &str = "__";

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    if !path.exists() {
        return Err(CommonError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CommonError::Config("Config file must have an extension".to_string()))?;

    let figment = match extension {
        "toml" => figment.merge(Toml::file(path)),
        "yaml" | "yml" => figment.merge(Yaml::file(path)),
        "json" => figment.merge(Json::file(path)),
        _ => {
            return Err(CommonError::Config(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };
    Ok(figment)
}

/// Load configuration from a specific file
pub fn load_config_from_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    merge_file(Figment::new(), path.as_ref())?
        .extract()
        .map_err(|e| CommonError::Config(format!("Failed to load configuration from file: {}", e)))
}

/// Load configuration from defaults, an optional file and the environment
///
/// Priority (highest to lowest):
/// 1. Environment variables starting with `env_prefix`, nested keys split on `__`
/// 2. The file at `path`, when given
/// 3. `T::default()`
pub fn load_layered<T>(path: Option<&Path>, env_prefix: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Serialize + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            figment = merge_file(figment, path)?;
        },
        None => debug!("No configuration file given, using defaults"),
    }

    figment
        .merge(Env::prefixed(env_prefix).split(ENV_NESTING_SEPARATOR))
        .extract()
        .map_err(|e| CommonError::Config(format!("Failed to load configuration: {}", e)))
}
