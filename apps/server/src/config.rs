//! Layered server configuration: an optional TOML file overlaid by `LIMBO__*`
//! environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "limbo";
pub const ENV_PREFIX: &str = "LIMBO";

#[limbo_derive::limbo_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub directory: PathBuf,
    /// Retention window in seconds.
    pub max_storage_seconds: u64,
    /// Accept uploads without keeping them.
    pub disabled: bool,
    /// Alternative prefix for download links, for when another web server serves
    /// the storage directory. Must end with `/`.
    pub web_url_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Enables rolling file logs in this directory.
    pub directory: Option<PathBuf>,
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 8080 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./storage"),
            max_storage_seconds: 24 * 60 * 60,
            disabled: false,
            web_url_base: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), directory: None, json: false }
    }
}

impl StorageConfig {
    #[must_use]
    pub const fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_storage_seconds)
    }

    /// Prefix for download links; an empty override counts as unset.
    #[must_use]
    pub fn url_base(&self) -> &str {
        self.web_url_base.as_deref().filter(|base| !base.is_empty()).unwrap_or("/files/")
    }
}

/// Loads `T` from a config file overlaid by environment variables.
///
/// 1. **File**: `path` if given (must exist), otherwise [`DEFAULT_CONFIG_FILE`] with any
///    supported extension, skipped when absent.
/// 2. **Environment**: variables prefixed with `LIMBO__`, nesting with `__`
///    (`LIMBO__STORAGE__DIRECTORY` maps to `storage.directory`).
///
/// # Errors
/// Returns [`ConfigError::Config`] if an explicit file is missing or the merged
/// values do not match `T`.
pub fn load_config<T>(path: Option<&Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let required = path.is_some();
    let effective_path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .convert_case(config::Case::Snake)
                .try_parsing(true),
        );

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<T>()
        .context("Failed to deserialize config")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_base_falls_back_to_builtin_route() {
        let mut storage = StorageConfig::default();
        assert_eq!(storage.url_base(), "/files/");

        storage.web_url_base = Some(String::new());
        assert_eq!(storage.url_base(), "/files/");

        storage.web_url_base = Some("https://cdn.example.com/limbo/".to_owned());
        assert_eq!(storage.url_base(), "https://cdn.example.com/limbo/");
    }

    #[test]
    fn max_age_is_in_seconds() {
        let storage = StorageConfig { max_storage_seconds: 90, ..StorageConfig::default() };
        assert_eq!(storage.max_age(), Duration::from_secs(90));
    }
}
