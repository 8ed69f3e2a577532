//! Settings file for the `wikifuse` binary
//!
//! ```toml
//! [logging]
//! level = "debug"
//!
//! [fusion]
//! similarity_threshold = 0.8
//! batch_algorithm = "hybrid"
//! ```
//!
//! Both sections are optional; missing keys take built-in defaults.

use crate::config::FusionConfig;
use crate::error::FusionResult;
use serde::Deserialize;
use std::path::Path;
use wikifuse_common::config::{load_or_default, LoggingConfig, CONFIG_ENV_VAR};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub fusion: FusionConfig,
}

impl Settings {
    /// Load from `--config`, `WIKIFUSE_CONFIG` or the user config dir
    pub fn load(cli_path: Option<&Path>) -> FusionResult<Self> {
        Self::load_with_env(cli_path, CONFIG_ENV_VAR)
    }

    /// As `load`, reading the path override from `env_var_name`
    pub fn load_with_env(cli_path: Option<&Path>, env_var_name: &str) -> FusionResult<Self> {
        let settings: Self = load_or_default(cli_path, env_var_name)?;
        settings.fusion.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_sections_parse() {
        let settings: Settings = toml::from_str(
            r#"
            [logging]
            level = "warn"

            [fusion]
            similarity_threshold = 0.9
            required_fields = ["name", "source", "url"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.logging.level, "warn");
        assert_eq!(settings.fusion.similarity_threshold, 0.9);
        assert_eq!(settings.fusion.required_fields.len(), 3);
    }
}
