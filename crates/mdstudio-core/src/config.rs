//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/mdstudio/config.toml)
//! 3. Environment variables (MDSTUDIO_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "MDSTUDIO";

/// GitHub REST API root
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Repository that holds the notes
pub const DEFAULT_REPO_NAME: &str = "markdown-studio-notes";

/// Page that renders token-based share links
pub const DEFAULT_SHARE_BASE_URL: &str = "https://apandey-studio.vercel.app/share.html";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local data (note store, share tokens, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the GitHub API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the private repository used as the cloud note store
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// Quiet period after the last edit before a cloud push, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Upper bound for the retry delay after failed pushes, in seconds
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Wait after creating the repository, in milliseconds
    #[serde(default = "default_provision_delay_ms")]
    pub provision_delay_ms: u64,

    /// Base URL for token share links
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,

    /// Log file (defaults to {data_dir}/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_url: default_api_url(),
            repo_name: default_repo_name(),
            debounce_ms: default_debounce_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            provision_delay_ms: default_provision_delay_ms(),
            share_base_url: default_share_base_url(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (MDSTUDIO_DATA_DIR, MDSTUDIO_API_URL, ...)
    /// 2. Config file (~/.config/mdstudio/config.toml or MDSTUDIO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
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

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration rooted at a specific data directory, everything else default
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_API_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.api_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_REPO", ENV_PREFIX)) {
            if !val.is_empty() {
                self.repo_name = val;
            }
        }

        // Unparseable values are ignored rather than failing startup
        if let Ok(val) = std::env::var(format!("{}_DEBOUNCE_MS", ENV_PREFIX)) {
            if let Ok(ms) = val.parse() {
                self.debounce_ms = ms;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with MDSTUDIO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mdstudio")
            .join("config.toml")
    }

    /// Directory holding the key/value store (one file per key)
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Log file, explicit or the default inside the data directory
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }

    /// Editor page that opens embedded (`#fragment`) links, next to the share page
    pub fn editor_url(&self) -> &str {
        match self.share_base_url.rfind('/') {
            Some(idx) if idx + 1 < self.share_base_url.len() => &self.share_base_url[..=idx],
            _ => &self.share_base_url,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn provision_delay(&self) -> Duration {
        Duration::from_millis(self.provision_delay_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mdstudio")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_repo_name() -> String {
    DEFAULT_REPO_NAME.to_string()
}

fn default_debounce_ms() -> u64 {
    2500
}

fn default_max_backoff_secs() -> u64 {
    60
}

fn default_provision_delay_ms() -> u64 {
    2000
}

fn default_share_base_url() -> String {
    DEFAULT_SHARE_BASE_URL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

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
        "MDSTUDIO_DATA_DIR",
        "MDSTUDIO_API_URL",
        "MDSTUDIO_REPO",
        "MDSTUDIO_DEBOUNCE_MS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.repo_name, "markdown-studio-notes");
        assert_eq!(config.debounce(), Duration::from_millis(2500));
        assert_eq!(config.provision_delay(), Duration::from_secs(2));
        assert!(config.data_dir.ends_with("mdstudio"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::with_data_dir("/data/mdstudio");
        assert_eq!(config.store_dir(), PathBuf::from("/data/mdstudio/store"));
        assert_eq!(config.log_path(), PathBuf::from("/data/mdstudio/debug.log"));
    }

    #[test]
    fn test_editor_url() {
        let mut config = Config::default();
        assert_eq!(config.editor_url(), "https://apandey-studio.vercel.app/");

        config.share_base_url = "http://localhost:8080/".into();
        assert_eq!(config.editor_url(), "http://localhost:8080/");
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("MDSTUDIO_DATA_DIR", "/tmp/mdstudio-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/mdstudio-test"));
    }

    #[test]
    fn test_env_override_debounce() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("MDSTUDIO_DEBOUNCE_MS", "750");
        config.apply_env_overrides();
        assert_eq!(config.debounce_ms, 750);

        // Garbage keeps the previous value
        env::set_var("MDSTUDIO_DEBOUNCE_MS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.debounce_ms, 750);
    }

    #[test]
    fn test_env_override_api_and_repo() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("MDSTUDIO_API_URL", "http://localhost:9000");
        env::set_var("MDSTUDIO_REPO", "scratch-notes");
        config.apply_env_overrides();
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.repo_name, "scratch-notes");

        // Empty string keeps the current value
        env::set_var("MDSTUDIO_REPO", "");
        config.apply_env_overrides();
        assert_eq!(config.repo_name, "scratch-notes");
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            debounce_ms: 1000,
            log_file: Some(PathBuf::from("/var/log/mdstudio.log")),
            ..Config::with_data_dir("/data/mdstudio")
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("repo_name"));
        assert!(toml_str.contains("debounce_ms"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.debounce_ms, 1000);
        assert_eq!(parsed.log_file, config.log_file);
    }

    #[test]
    fn test_load_from_str_fills_defaults() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            repo_name = "my-notes"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.repo_name, "my-notes");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.max_backoff_secs, 60);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("MDSTUDIO_DATA_DIR", temp_dir.path());

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.repo_name, DEFAULT_REPO_NAME);
        assert_eq!(config.data_dir, temp_dir.path());
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            repo_name: "saved-notes".to_string(),
            ..Config::with_data_dir(temp_dir.path().join("data"))
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.repo_name, "saved-notes");
        assert!(loaded.data_dir.exists());
    }
}
