//! Configuration file loading and resolution
//!
//! Config file resolution priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `<user config dir>/wikifuse/config.toml`, if it exists
//! 4. No file: callers fall back to built-in defaults

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the environment variable consulted for the config file path
pub const CONFIG_ENV_VAR: &str = "WIKIFUSE_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the config file path
///
/// Returns `None` when no candidate applies; a missing file is not an error
/// at this stage, only a file that was explicitly requested and cannot be read.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: user config directory
    let user_config = default_config_path()?;
    if user_config.exists() {
        Some(user_config)
    } else {
        debug!(path = %user_config.display(), "No user config file present");
        None
    }
}

/// Platform config location: `~/.config/wikifuse/config.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("wikifuse").join("config.toml"))
}

/// Read and deserialize a TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let parsed = toml::from_str(&content)?;
    info!(path = %path.display(), "Loaded configuration file");
    Ok(parsed)
}

/// Load a TOML file if one resolves, else return the type's defaults
pub fn load_or_default<T: DeserializeOwned + Default>(
    cli_arg: Option<&Path>,
    env_var_name: &str,
) -> Result<T> {
    match resolve_config_path(cli_arg, env_var_name) {
        Some(path) => load_toml(&path),
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(T::default())
        }
    }
}
