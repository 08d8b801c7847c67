//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/kosync/config.toml)
//! 3. Environment variables (KOSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.
//! Credentials are never read from the config file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::conflict::DEFAULT_ADOPT_REMOTE_THRESHOLD;
use crate::debounce::{DebouncePolicy, DEFAULT_DEBOUNCE_SECONDS, DEFAULT_MIN_PAGE_DELTA};
use crate::device::DEFAULT_DEVICE_NAME;
use crate::identity::IdentityStrategy;
use crate::transport::{DEFAULT_SERVER_URL, DEFAULT_TIMEOUT_SECS};

/// Environment variable prefix
const ENV_PREFIX: &str = "KOSYNC";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root URL of the sync service
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Directory for local state (device id, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name other devices see for this one
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// How document keys are derived
    #[serde(default)]
    pub identity_strategy: IdentityStrategy,

    /// Cooldown between pushes for one document
    #[serde(default = "default_debounce_seconds")]
    pub debounce_seconds: i64,

    /// Pages the reader must advance between pushes
    #[serde(default = "default_min_page_delta")]
    pub min_page_delta: i64,

    /// Lead the remote needs before its position is adopted
    #[serde(default = "default_adopt_remote_threshold")]
    pub adopt_remote_threshold: f64,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log file (stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            data_dir: default_data_dir(),
            device_name: default_device_name(),
            identity_strategy: IdentityStrategy::default(),
            debounce_seconds: DEFAULT_DEBOUNCE_SECONDS,
            min_page_delta: DEFAULT_MIN_PAGE_DELTA,
            adopt_remote_threshold: DEFAULT_ADOPT_REMOTE_THRESHOLD,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.server_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_DEVICE_NAME", ENV_PREFIX)) {
            if !val.is_empty() {
                self.device_name = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_STRATEGY", ENV_PREFIX)) {
            self.identity_strategy = val
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("Invalid KOSYNC_STRATEGY")?;
        }

        if let Ok(val) = std::env::var(format!("{}_DEBOUNCE_SECONDS", ENV_PREFIX)) {
            self.debounce_seconds = val
                .parse()
                .with_context(|| format!("Invalid KOSYNC_DEBOUNCE_SECONDS: {}", val))?;
        }

        Ok(())
    }

    /// Ensure data directory exists
    pub fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with KOSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kosync")
            .join("config.toml")
    }

    /// Get the path of the persisted device identifier
    pub fn device_id_path(&self) -> PathBuf {
        self.data_dir.join("device_id")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Engine tunables derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            debounce: DebouncePolicy::new(self.debounce_seconds, self.min_page_delta),
            adopt_remote_threshold: self.adopt_remote_threshold,
            identity_strategy: self.identity_strategy,
            device_name: self.device_name.clone(),
        }
    }
}

/// Tunables of a single sync engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Push debounce gate
    pub debounce: DebouncePolicy,
    /// Lead the remote needs before its position is adopted
    pub adopt_remote_threshold: f64,
    /// How document keys are derived
    pub identity_strategy: IdentityStrategy,
    /// Name other devices see for this one
    pub device_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: DebouncePolicy::default(),
            adopt_remote_threshold: DEFAULT_ADOPT_REMOTE_THRESHOLD,
            identity_strategy: IdentityStrategy::default(),
            device_name: default_device_name(),
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kosync")
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_debounce_seconds() -> i64 {
    DEFAULT_DEBOUNCE_SECONDS
}

fn default_min_page_delta() -> i64 {
    DEFAULT_MIN_PAGE_DELTA
}

fn default_adopt_remote_threshold() -> f64 {
    DEFAULT_ADOPT_REMOTE_THRESHOLD
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "KOSYNC_SERVER_URL",
        "KOSYNC_DATA_DIR",
        "KOSYNC_DEVICE_NAME",
        "KOSYNC_STRATEGY",
        "KOSYNC_DEBOUNCE_SECONDS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_url, "https://sync.koreader.rocks");
        assert_eq!(config.debounce_seconds, 25);
        assert_eq!(config.min_page_delta, 1);
        assert_eq!(config.adopt_remote_threshold, 0.02);
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
        assert_eq!(config.identity_strategy, IdentityStrategy::Filename);
        assert!(config.data_dir.ends_with("kosync"));
    }

    #[test]
    fn test_device_id_path() {
        let config = Config::default();
        assert!(config.device_id_path().ends_with("device_id"));
    }

    #[test]
    fn test_load_from_str_partial() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str(
            r#"
            server_url = "https://sync.example.org"
            identity_strategy = "partial_content"
            debounce_seconds = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.server_url, "https://sync.example.org");
        assert_eq!(config.identity_strategy, IdentityStrategy::PartialContent);
        assert_eq!(config.debounce_seconds, 60);
        assert_eq!(config.min_page_delta, 1);
    }

    #[test]
    fn test_load_from_missing_path_uses_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();

        let config = Config::load_from_path(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.device_name, "kosync");
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.device_name = "Kobo Clara".to_string();
        config.adopt_remote_threshold = 0.05;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.device_name, "Kobo Clara");
        assert_eq!(loaded.adopt_remote_threshold, 0.05);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("KOSYNC_SERVER_URL", "http://localhost:7200");
        env::set_var("KOSYNC_STRATEGY", "partial");
        env::set_var("KOSYNC_DEBOUNCE_SECONDS", "5");

        let mut config = Config::default();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.server_url, "http://localhost:7200");
        assert_eq!(config.identity_strategy, IdentityStrategy::PartialContent);
        assert_eq!(config.debounce_seconds, 5);
    }

    #[test]
    fn test_env_override_invalid_strategy() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("KOSYNC_STRATEGY", "sha256");
        let mut config = Config::default();
        assert!(config.apply_env_overrides().is_err());
    }

    #[test]
    fn test_engine_config_from_config() {
        let mut config = Config::default();
        config.min_page_delta = 3;
        config.device_name = "Tablet".to_string();

        let engine = config.engine_config();
        assert_eq!(engine.debounce, DebouncePolicy::new(25, 3));
        assert_eq!(engine.device_name, "Tablet");
        assert_eq!(engine.adopt_remote_threshold, 0.02);
    }
}
