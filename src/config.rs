use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Backend settings
#[derive(Debug, Clone, Serialize)]
pub struct RemoteConfig {
    /// JSON snapshot backing the document store
    pub store_path: ConfigValue<PathBuf>,
    /// URL probed to decide whether the network is up
    pub probe_url: Option<String>,
    /// Force the offline path regardless of the probe
    pub offline: ConfigValue<bool>,
}

/// Signed-in user; no uid means signed out
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    pub uid: Option<String>,
    pub display_name: Option<String>,
}

impl UserConfig {
    pub fn is_signed_in(&self) -> bool {
        self.uid.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the local SQLite cache
    pub database_path: ConfigValue<PathBuf>,
    pub remote: RemoteConfig,
    pub user: UserConfig,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RemoteFile {
    store_path: Option<PathBuf>,
    probe_url: Option<String>,
    offline: Option<bool>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    remote: Option<RemoteFile>,
    user: Option<UserConfig>,
}

/// Resolve relative paths against the config file's directory
fn resolve(config_path: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() {
        config_path.parent().map(|p| p.join(&path)).unwrap_or(path)
    } else {
        path
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = Self::default_data_dir();

        // Start with defaults
        let mut database_path =
            ConfigValue::new(data_dir.join("culinary.db"), ConfigSource::Default);
        let mut store_path = ConfigValue::new(data_dir.join("remote.json"), ConfigSource::Default);
        let mut probe_url = None;
        let mut offline = ConfigValue::new(false, ConfigSource::Default);
        let mut user = UserConfig::default();
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                database_path = ConfigValue::new(resolve(&path, db_path), ConfigSource::File);
            }
            if let Some(remote) = file_config.remote {
                if let Some(p) = remote.store_path {
                    store_path = ConfigValue::new(resolve(&path, p), ConfigSource::File);
                }
                if let Some(flag) = remote.offline {
                    offline = ConfigValue::new(flag, ConfigSource::File);
                }
                probe_url = remote.probe_url;
            }
            if let Some(file_user) = file_config.user {
                user = file_user;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("CULINARY_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(p) = std::env::var("CULINARY_REMOTE_PATH") {
            store_path = ConfigValue::new(PathBuf::from(p), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("CULINARY_PROBE_URL") {
            probe_url = Some(url);
        }
        if let Ok(raw) = std::env::var("CULINARY_OFFLINE") {
            let flag = parse_bool(&raw).ok_or(ConfigError::InvalidEnv("CULINARY_OFFLINE", raw))?;
            offline = ConfigValue::new(flag, ConfigSource::Environment);
        }
        if let Ok(uid) = std::env::var("CULINARY_USER") {
            user.uid = Some(uid);
        }
        if let Ok(name) = std::env::var("CULINARY_DISPLAY_NAME") {
            user.display_name = Some(name);
        }

        Ok(Self {
            database_path,
            remote: RemoteConfig {
                store_path,
                probe_url,
                offline,
            },
            user,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/culinary/
    /// - macOS: ~/Library/Application Support/culinary/
    /// - Windows: %APPDATA%/culinary/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("culinary")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/culinary/
    /// - macOS: ~/Library/Application Support/culinary/
    /// - Windows: %APPDATA%/culinary/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("culinary")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidEnv(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidEnv(name, value) => {
                write!(f, "Invalid value '{}' for {}", value, name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
