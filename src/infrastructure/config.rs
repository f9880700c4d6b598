use std::path::{Path, PathBuf};

use config::ConfigError;
use serde::Deserialize;
use tracing::debug;

use crate::{controller::ControllerOptions, utils};

const CONFIG: &str = include_str!("../../.config/config.json5");

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub _data_dir: PathBuf,
    #[serde(default)]
    pub _config_dir: PathBuf,
}

/// Settings for the in-memory demo source
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    pub total_items: u32,
    pub latency_ms: u64,
    /// Fail every n-th fetch call; `None` never fails
    pub fail_every: Option<u32>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            total_items: 95,
            latency_ms: 50,
            fail_every: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, flatten)]
    pub config: AppConfig,
    #[serde(default)]
    pub controller: ControllerOptions,
    #[serde(default)]
    pub source: SourceConfig,
}

impl Config {
    /// Load the bundled defaults overlaid with any config file found in the
    /// user's config directory
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_from(&utils::get_config_dir())
    }

    /// The bundled defaults alone
    pub fn defaults() -> Result<Self, ConfigError> {
        json5::from_str(CONFIG)
            .map_err(|e| ConfigError::Message(format!("Failed to load default config: {e}")))
    }

    pub fn load_from(config_dir: &Path) -> Result<Self, ConfigError> {
        let data_dir = utils::get_data_dir();
        let mut builder = config::Config::builder()
            .set_default("_data_dir", data_dir.to_string_lossy().into_owned())?
            .set_default("_config_dir", config_dir.to_string_lossy().into_owned())?
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        let config_files = [
            ("config.json5", config::FileFormat::Json5),
            ("config.json", config::FileFormat::Json),
            ("config.yaml", config::FileFormat::Yaml),
            ("config.toml", config::FileFormat::Toml),
            ("config.ini", config::FileFormat::Ini),
        ];
        let mut found_config = false;
        for (file, format) in &config_files {
            builder = builder.add_source(
                config::File::from(config_dir.join(file))
                    .format(*format)
                    .required(false),
            );
            if config_dir.join(file).exists() {
                found_config = true
            }
        }
        if !found_config {
            debug!(
                "No configuration file found in {}, using defaults",
                config_dir.display()
            );
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        if cfg.controller.page_size == 0 {
            return Err(ConfigError::Message(String::from(
                "controller.page_size must be at least 1",
            )));
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults_parse() -> Result<(), ConfigError> {
        let cfg = Config::defaults()?;
        assert_eq!(cfg.controller.page_size, 10);
        assert_eq!(cfg.controller.max_retries, 2);
        assert_eq!(cfg.source.total_items, 95);
        assert_eq!(cfg.source.fail_every, None);
        Ok(())
    }

    #[test]
    fn test_missing_config_dir_falls_back_to_defaults() -> Result<(), ConfigError> {
        let dir = Path::new("/nonexistent/pageable-config");
        let cfg = Config::load_from(dir)?;
        let defaults = Config::defaults()?;

        assert_eq!(cfg.controller, defaults.controller);
        assert_eq!(cfg.source, defaults.source);
        assert_eq!(cfg.config._config_dir, dir.to_path_buf());
        Ok(())
    }
}
