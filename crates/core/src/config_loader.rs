use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `config/Config.toml` and `SALESOPS_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config/Config.toml")
    }

    /// Loads configuration layered as defaults, then the TOML file at `path`,
    /// then environment variables (`SALESOPS_DETECTION__ZSCORE_THRESHOLD=2.5`).
    ///
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or the merged
    /// configuration fails validation.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SALESOPS_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {path}"))?;

        config.detection.validate()?;
        tracing::debug!(path, detection = ?config.detection, "configuration loaded");
        Ok(config)
    }
}
