//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::websocket::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP / WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for static assets
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Title rendered into the tracker page
    #[serde(default = "default_page_title")]
    pub page_title: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3002
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_page_title() -> String {
    "Real-Time Location Tracker".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            page_title: default_page_title(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Presence hub tuning
#[derive(Debug, Clone, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
}

fn default_outbound_capacity() -> usize {
    64
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            outbound_capacity: default_outbound_capacity(),
        }
    }
}

impl From<&HubSettings> for HubConfig {
    fn from(settings: &HubSettings) -> Self {
        HubConfig {
            outbound_capacity: settings.outbound_capacity,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> LoadedConfig {
        let mut config = Config::default();
        let warnings = config.apply_env_overrides();
        LoadedConfig {
            config,
            source: None,
            warnings,
        }
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<LoadedConfig, ConfigError> {
        let mut config = Self::load(path)?;
        let warnings = config.apply_env_overrides();
        Ok(LoadedConfig {
            config,
            source: Some(path.to_path_buf()),
            warnings,
        })
    }

    /// Load from default locations or environment
    pub fn load_default() -> LoadedConfig {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("presence-relay").join("config.toml")),
            Some(PathBuf::from("/etc/presence-relay/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths, |key| std::env::var(key).ok())
    }

    /// Use the first existing path that loads, falling back to defaults.
    /// Files that exist but fail to load are recorded as warnings.
    fn load_first<F>(paths: &[PathBuf], var: F) -> LoadedConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load(path) {
                Ok(mut config) => {
                    let mut warnings = skipped;
                    warnings.extend(config.apply_overrides(&var));
                    return LoadedConfig {
                        config,
                        source: Some(path.clone()),
                        warnings,
                    };
                }
                Err(e) => skipped.push(e.to_string()),
            }
        }

        let mut config = Config::default();
        skipped.extend(config.apply_overrides(&var));
        LoadedConfig {
            config,
            source: None,
            warnings: skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Returns a warning for every override that was ignored
    fn apply_overrides<F>(&mut self, var: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        if let Some(host) = var("PRESENCE_RELAY_HOST") {
            self.server.host = host;
        }
        // PORT wins over PRESENCE_RELAY_PORT
        for key in ["PRESENCE_RELAY_PORT", "PORT"] {
            if let Some(port) = var(key) {
                match port.parse() {
                    Ok(p) => self.server.port = p,
                    Err(_) => warnings.push(format!("Ignoring invalid {}={:?}", key, port)),
                }
            }
        }
        if let Some(dir) = var("PRESENCE_RELAY_STATIC_DIR") {
            self.server.static_dir = dir;
        }

        if let Some(level) = var("PRESENCE_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("PRESENCE_RELAY_LOG_FORMAT") {
            self.logging.format = format;
        }

        warnings
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig::from(&self.hub)
    }
}

/// A loaded config plus what happened while loading it.
///
/// Loading runs before the tracing subscriber exists, so messages are kept
/// here and emitted with [`LoadedConfig::log`] once logging is set up.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the config came from, `None` for built-in defaults
    pub source: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn log(&self) {
        for warning in &self.warnings {
            tracing::warn!("{}", warning);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::info!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Presence Relay Configuration
#
# Environment variables override these settings:
# - PORT / PRESENCE_RELAY_PORT
# - PRESENCE_RELAY_HOST
# - PRESENCE_RELAY_STATIC_DIR
# - PRESENCE_RELAY_LOG_LEVEL
# - PRESENCE_RELAY_LOG_FORMAT

[server]
host = "0.0.0.0"
port = 3002

# Directory served for static assets (scripts, styles, images)
static_dir = "public"

page_title = "Real-Time Location Tracker"

[hub]
# Events queued per client before further events are dropped
outbound_capacity = 64

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
