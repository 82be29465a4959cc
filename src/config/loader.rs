//! Configuration Loader
//!
//! Loads client settings from a config file and `RESTKIT_*` environment
//! variables, in that order of precedence (environment wins).

use crate::config::client::ClientConfig;
use crate::error::{ApiError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "RESTKIT_CONFIG";

/// Configuration loader with support for multiple sources
#[derive(Debug)]
pub struct ConfigLoader {
    config: Option<ClientConfig>,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load `.env`, the first config file found in the default locations,
    /// then environment overrides
    pub fn new() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut loader = Self::empty();
        loader.load_from_default_paths()?;
        loader.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok(loader)
    }

    /// Load a specific config file, then environment overrides
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut loader = Self::empty();
        loader.load_from_file(path)?;
        loader.apply_env_overrides(|key| std::env::var(key).ok())?;

        Ok(loader)
    }

    fn empty() -> Self {
        Self {
            config: None,
            source: None,
        }
    }

    /// Load configuration from the first default path that exists
    fn load_from_default_paths(&mut self) -> Result<()> {
        if let Some(path) = Self::get_config_paths().into_iter().find(|p| p.exists()) {
            self.load_from_file(path)?;
        }

        Ok(())
    }

    /// Get list of config paths to check, highest priority first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Environment variable
        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        // 2. Current directory
        paths.push(PathBuf::from("restkit.json"));

        // 3. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("restkit").join("config.json"));
        }

        // 4. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".restkit").join("config.json"));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApiError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: ClientConfig = serde_json::from_str(&content).map_err(|e| {
            ApiError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "loaded client configuration");
        self.config = Some(config);
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    /// Apply `RESTKIT_*` overrides read through `lookup`
    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("RESTKIT_BASE_URL") {
            match &mut self.config {
                Some(config) => config.base_url = base_url,
                None => self.config = Some(ClientConfig::new(base_url)),
            }
        }

        let Some(config) = self.config.as_mut() else {
            return Ok(());
        };

        if let Some(key) = lookup("RESTKIT_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(v) = parse_override(&lookup, "RESTKIT_RATE_LIMIT")? {
            config.rate_limit = v;
        }
        if let Some(v) = parse_override(&lookup, "RESTKIT_RATE_PERIOD")? {
            config.rate_period = v;
        }
        if let Some(v) = parse_override(&lookup, "RESTKIT_MAX_RETRIES")? {
            config.max_retries = v;
        }
        if let Some(v) = parse_override(&lookup, "RESTKIT_RETRY_DELAY")? {
            config.retry_delay = v;
        }
        if let Some(v) = parse_override(&lookup, "RESTKIT_TIMEOUT")? {
            config.timeout = v;
        }

        Ok(())
    }

    /// Override the base URL (e.g. from a command-line flag)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        match &mut self.config {
            Some(config) => config.base_url = base_url,
            None => self.config = Some(ClientConfig::new(base_url)),
        }
        self
    }

    /// File the configuration came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Get the loaded configuration
    pub fn config(&self) -> Option<&ClientConfig> {
        self.config.as_ref()
    }

    /// Take ownership of the configuration, validated
    pub fn into_config(self) -> Result<ClientConfig> {
        let config = self.config.ok_or_else(|| {
            ApiError::Config(format!(
                "no base URL configured; set RESTKIT_BASE_URL or create restkit.json (or point {} at a file)",
                CONFIG_PATH_ENV
            ))
        })?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ApiError::Config(format!("Invalid {}={:?}: {}", key, raw, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn config_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", json).unwrap();
        file
    }

    #[test]
    fn test_load_from_custom_file() {
        let file = config_file(
            r#"{
                "base_url": "https://custom.api.com/v1/",
                "rate_limit": 10,
                "max_retries": 1
            }"#,
        );

        let mut loader = ConfigLoader::empty();
        loader.load_from_file(file.path()).unwrap();
        assert_eq!(loader.source(), Some(file.path()));

        let config = loader.into_config().unwrap();
        assert_eq!(config.normalized_base_url(), "https://custom.api.com/v1");
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_unparseable_file() {
        let file = config_file("{ not json");
        let mut loader = ConfigLoader::empty();
        let err = loader.load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ApiError::Config(msg) if msg.contains("Failed to parse")));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::from_path("/definitely/not/here/restkit.json").unwrap_err();
        assert!(matches!(err, ApiError::Config(msg) if msg.contains("Failed to read")));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = config_file(r#"{ "base_url": "https://file.example.com", "timeout": 3 }"#);

        let mut loader = ConfigLoader::empty();
        loader.load_from_file(file.path()).unwrap();
        loader
            .apply_env_overrides(env(&[
                ("RESTKIT_BASE_URL", "https://env.example.com"),
                ("RESTKIT_API_KEY", "from-env"),
                ("RESTKIT_MAX_RETRIES", "7"),
                ("RESTKIT_RETRY_DELAY", "0.5"),
            ]))
            .unwrap();

        let config = loader.into_config().unwrap();
        assert_eq!(config.base_url, "https://env.example.com");
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.retry_delay, 0.5);
        assert_eq!(config.timeout, 3.0);
    }

    #[test]
    fn test_env_alone_is_enough() {
        let mut loader = ConfigLoader::empty();
        loader
            .apply_env_overrides(env(&[
                ("RESTKIT_BASE_URL", "https://env.example.com"),
                ("RESTKIT_RATE_LIMIT", "5"),
            ]))
            .unwrap();

        let config = loader.into_config().unwrap();
        assert_eq!(config.rate_limit, 5);
        assert_eq!(config.rate_period, 60.0);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut loader = ConfigLoader::empty().with_base_url("https://api.example.com");
        let err = loader
            .apply_env_overrides(env(&[("RESTKIT_RATE_LIMIT", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ApiError::Config(msg) if msg.contains("RESTKIT_RATE_LIMIT")));
    }

    #[test]
    fn test_nothing_configured() {
        let mut loader = ConfigLoader::empty();
        loader.apply_env_overrides(env(&[])).unwrap();
        assert!(loader.config().is_none());
        assert!(matches!(loader.into_config(), Err(ApiError::Config(_))));
    }

    #[test]
    fn test_into_config_validates() {
        let file = config_file(r#"{ "base_url": "https://api.example.com", "rate_limit": 0 }"#);
        let mut loader = ConfigLoader::empty();
        loader.load_from_file(file.path()).unwrap();
        assert!(matches!(loader.into_config(), Err(ApiError::Config(_))));
    }
}
