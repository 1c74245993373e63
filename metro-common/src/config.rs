//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from, in priority order:
//! 1. Command-line arguments (resolved by each binary)
//! 2. Environment variables
//! 3. TOML config file
//! 4. OS-dependent compiled defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "METRO_ROOT_FOLDER";

/// Environment variable overriding the dispatch bearer token
pub const DISPATCH_TOKEN_ENV: &str = "METRO_DISPATCH_TOKEN";

/// Database file name used when no explicit path is configured
pub const DEFAULT_DATABASE_FILE: &str = "metro.db";

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional in the file; missing values fall back to the
/// compiled defaults below.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Database file, absolute or relative to the root folder
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Outbound message dispatch endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Batch endpoint URL; reminders are disabled when absent
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token (overridden by METRO_DISPATCH_TOKEN)
    #[serde(default)]
    pub token: Option<String>,

    /// Sender label shown on reminder messages
    #[serde(default = "default_sender_name")]
    pub sender_name: String,

    /// Sender e-mail address
    #[serde(default = "default_sender_address")]
    pub sender_address: String,

    /// HTTP timeout for the batch call
    #[serde(default = "default_dispatch_timeout")]
    pub timeout_secs: u64,
}

/// Monthly reminder job switches
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Run the monthly sweep on its schedule
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5740
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sender_name() -> String {
    "Calibration Control".to_string()
}

fn default_sender_address() -> String {
    "no-reply@localhost".to_string()
}

fn default_dispatch_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
            dispatch: DispatchConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            sender_name: default_sender_name(),
            sender_address: default_sender_address(),
            timeout_secs: default_dispatch_timeout(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl DispatchConfig {
    /// Bearer token, environment first then TOML
    pub fn resolve_token(&self) -> Option<String> {
        std::env::var(DISPATCH_TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.token.clone().filter(|t| !t.trim().is_empty()))
    }

    /// Endpoint if one is configured and non-blank
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

impl TomlConfig {
    /// Database location: explicit TOML path (relative to root) or `<root>/metro.db`
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root_folder.join(path),
            None => root_folder.join(DEFAULT_DATABASE_FILE),
        }
    }
}

/// Parse a TOML bootstrap file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Load the TOML file given on the command line, else the first default
/// location that exists, else compiled defaults
pub fn load_bootstrap_config(cli_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = cli_path {
        return load_toml_config(path);
    }

    match find_config_file() {
        Some(path) => load_toml_config(&path),
        None => {
            debug!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Default configuration file locations for the platform
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("metro").join("metro-cal.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/metro/metro-cal.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("metro"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/metro"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("metro"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/metro"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("metro"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\metro"))
    } else {
        PathBuf::from("./metro_data")
    }
}
