//! Runtime configuration (ambient stack supplement — the distilled
//! specification's scope stops at the registration graph itself, but a
//! deployable build still needs a place to configure logging and the
//! demo namespace set; this mirrors the teacher's own `serde`+`toml`
//! dependency pair, which its retrieved sources pull in but never wire up).

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration file shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub namespaces: Vec<NamespaceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: LogLevel::Info }
    }
}

/// One network namespace to create a [`crate::group::Group`] for at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceConfig {
    pub name: String,
    #[serde(default)]
    pub read_only: bool,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        toml::from_str(&text).map_err(ConfigError::Parse)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { logging: LoggingConfig::default(), namespaces: Vec::new() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(toml::de::Error),
}

/// Install a `tracing_subscriber` global subscriber at the configured level
/// (teacher wiring: `tracing` + `tracing-subscriber` with `fmt`+`env-filter`).
pub fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaces_and_defaults_level() {
        let text = r#"
            [[namespaces]]
            name = "ns0"

            [[namespaces]]
            name = "ns1"
            read_only = true
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.namespaces.len(), 2);
        assert!(!config.namespaces[0].read_only);
        assert!(config.namespaces[1].read_only);
        assert!(matches!(config.logging.level, LogLevel::Info));
    }
}
