//! Configuration management for Retoot
//!
//! Everything the relay needs is an explicit struct handed to constructors;
//! no component reads the process environment at runtime. The only ambient
//! input is `RETOOT_CONFIG`, consulted once when resolving the config path.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Source platform (Twitter) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Screen name of the account to relay from
    pub account: String,
    /// File holding the API bearer token
    pub bearer_token_file: String,
    /// How many timeline entries to request per poll
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// API base URL, overridable for tests and proxies
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Destination platform (Mastodon) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Instance URL, with or without the https:// prefix
    pub instance: String,
    /// File holding the OAuth access token
    pub token_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum age in seconds for a source post to be eligible for relay
    pub lookback_seconds: u64,
    /// Seconds between relay cycles
    pub poll_interval: u64,
    /// Newline-delimited file of already-relayed post ids
    pub cache_file: String,
    /// Root directory for per-post media staging
    pub media_dir: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            lookback_seconds: 60,
            poll_interval: 30,
            cache_file: "~/.local/share/retoot/relayed.ids".to_string(),
            media_dir: "~/.local/share/retoot/media".to_string(),
        }
    }
}

fn default_page_size() -> usize {
    5
}

fn default_api_base() -> String {
    "https://api.twitter.com/1.1".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("RETOOT_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("retoot").join("config.toml"))
}

/// Expand `~` and environment references in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const FULL_CONFIG: &str = r#"
[source]
account = "somebody"
bearer_token_file = "/tmp/twitter.token"
page_size = 10
api_base = "http://localhost:8080/1.1"

[destination]
instance = "mastodon.example"
token_file = "/tmp/mastodon.token"

[relay]
lookback_seconds = 120
poll_interval = 15
cache_file = "/tmp/relayed.ids"
media_dir = "/tmp/media"
"#;

    const MINIMAL_CONFIG: &str = r#"
[source]
account = "somebody"
bearer_token_file = "/tmp/twitter.token"

[destination]
instance = "mastodon.example"
token_file = "/tmp/mastodon.token"
"#;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(FULL_CONFIG).unwrap();
        assert_eq!(config.source.account, "somebody");
        assert_eq!(config.source.page_size, 10);
        assert_eq!(config.source.api_base, "http://localhost:8080/1.1");
        assert_eq!(config.destination.instance, "mastodon.example");
        assert_eq!(config.relay.lookback_seconds, 120);
        assert_eq!(config.relay.poll_interval, 15);
        assert_eq!(config.relay.cache_file, "/tmp/relayed.ids");
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL_CONFIG).unwrap();
        assert_eq!(config.source.page_size, 5);
        assert_eq!(config.source.api_base, "https://api.twitter.com/1.1");
        assert_eq!(config.relay.lookback_seconds, 60);
        assert_eq!(config.relay.poll_interval, 30);
        assert!(config.relay.cache_file.ends_with("relayed.ids"));
    }

    #[test]
    fn test_missing_section_fails() {
        let result: std::result::Result<Config, _> = toml::from_str(
            r#"
[source]
account = "somebody"
bearer_token_file = "/tmp/twitter.token"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_CONFIG.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load_from_path(&file.path().to_path_buf()).unwrap();
        assert_eq!(config.source.account, "somebody");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load_from_path(&PathBuf::from("/nonexistent/retoot.toml"));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        std::env::set_var("RETOOT_CONFIG", "/tmp/custom-retoot.toml");
        let path = resolve_config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom-retoot.toml"));
        std::env::remove_var("RETOOT_CONFIG");
    }

    #[test]
    #[serial]
    fn test_config_path_default() {
        std::env::remove_var("RETOOT_CONFIG");
        let path = resolve_config_path().unwrap();
        assert!(path.ends_with("retoot/config.toml"));
    }

    #[test]
    fn test_expand_path_plain() {
        assert_eq!(expand_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
