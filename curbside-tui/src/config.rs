//! Host configuration loaded from `curbside.toml` and `CURBSIDE_*` variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use curbside_core::{flow::AddressForm, registry::DEFAULT_UPDATE_INTERVAL};
use curbside_provider_milwaukee::BASE_URL;
use serde::Deserialize;

/// Configuration file read when no path is given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "curbside.toml";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HostConfig {
    /// Hours between scheduled polls.
    #[serde(default = "default_poll_interval_hours")]
    pub poll_interval_hours: u64,
    /// Lookup endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// User agent of outgoing requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Where logs are written while the terminal is in raw mode.
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Addresses configured at startup.
    #[serde(default)]
    pub addresses: Vec<AddressForm>,
}

fn default_poll_interval_hours() -> u64 {
    DEFAULT_UPDATE_INTERVAL.as_secs() / 3600
}

fn default_endpoint() -> String {
    BASE_URL.to_owned()
}

fn default_user_agent() -> String {
    format!("curbside/{}", env!("CARGO_PKG_VERSION"))
}

fn default_log_file() -> PathBuf {
    PathBuf::from("curbside.log")
}

impl HostConfig {
    /// Load from `path` (optional file) plus environment overrides.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

        let builder = Config::builder()
            .add_source(File::from(path).required(false).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("CURBSIDE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_hours == 0 {
            bail!("poll_interval_hours must be at least 1");
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            bail!("endpoint must be an http(s) URL, got '{}'", self.endpoint);
        }
        Ok(())
    }

    /// Period between scheduled polls.
    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_hours.saturating_mul(60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<HostConfig> {
        HostConfig::from_builder(
            Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = from_toml("").expect("defaults");
        assert_eq!(config.poll_interval(), DEFAULT_UPDATE_INTERVAL);
        assert_eq!(config.endpoint, BASE_URL);
        assert!(config.addresses.is_empty());
    }

    #[test]
    fn reads_addresses() {
        let config = from_toml(
            r#"
            poll_interval_hours = 12

            [[addresses]]
            house_number = "2100"
            direction = "N"
            street_name = "Main"
            street_suffix = "ST"

            [[addresses]]
            house_number = "841"
            street_name = "Broadway"
            street_suffix = "AV"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.poll_interval_hours, 12);
        assert_eq!(config.addresses.len(), 2);
        assert_eq!(
            config.addresses.get(1).map(|form| form.direction.as_str()),
            Some(""),
            "direction defaults to empty"
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(from_toml("poll_interval_hours = 0").is_err(), "zero interval");
        assert!(from_toml("endpoint = \"ftp://example\"").is_err(), "non-http endpoint");
    }
}
