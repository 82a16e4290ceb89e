//! # Application Configuration
//!
//! Static configuration read once at startup and resolved into a
//! [`ConfigMode`] that never changes for the life of the process.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STRIDE_ENABLE_SYNC=true        (VITE_ENABLE_SYNC accepted)         │
//! │     STRIDE_LOCAL_ONLY=true         (VITE_LOCAL_ONLY accepted)          │
//! │     STRIDE_POWERSYNC_URL=https://...                                   │
//! │     SENTRY_DSN=https://...         (STRIDE_SENTRY_DSN wins)            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stride/stride.toml (Linux)                               │
//! │     ~/Library/Application Support/com.stride.app/stride.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     enableSync = false, dbFilename = "stride.db"                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The desktop host fills the environment from `.env` and `.env.backend`
//! before loading; variables already set are left alone.
//!
//! ## Configuration File Format
//! ```toml
//! # stride.toml
//! enableSync = true
//! dbFilename = "stride.db"
//! supabaseUrl = "https://project.supabase.co"
//! supabaseAnonKey = "public-anon-key"
//! powersyncUrl = "https://instance.powersync.journeyapps.com"
//!
//! [sync]
//! connect_timeout_secs = 10
//! ping_interval_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Default config file name under the platform config dir.
pub const CONFIG_FILE_NAME: &str = "stride.toml";

// =============================================================================
// Config Mode
// =============================================================================

/// Whether this process syncs at all. Resolved once, never re-evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMode {
    /// Everything stays in the local store; sync is permanently disabled.
    LocalOnly,

    /// The local store mirrors a remote service.
    CloudSync(CloudSyncConfig),
}

impl ConfigMode {
    /// Returns true in CloudSync mode.
    pub fn is_cloud_sync(&self) -> bool {
        matches!(self, ConfigMode::CloudSync(_))
    }

    /// Returns the remote settings, if any.
    pub fn cloud(&self) -> Option<&CloudSyncConfig> {
        match self {
            ConfigMode::CloudSync(cloud) => Some(cloud),
            ConfigMode::LocalOnly => None,
        }
    }

    /// Short name for logging and the UI.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigMode::LocalOnly => "local_only",
            ConfigMode::CloudSync(_) => "cloud_sync",
        }
    }
}

/// Validated remote endpoints and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSyncConfig {
    /// Auth service base URL.
    pub supabase_url: Url,

    /// Public anon key sent with every auth request.
    pub supabase_anon_key: String,

    /// Remote sync endpoint.
    pub powersync_url: Url,
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Timeouts for the sync connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How long to wait for a close handshake, in seconds.
    #[serde(default = "default_disconnect_timeout")]
    pub disconnect_timeout_secs: u64,

    /// Keepalive ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Upper bound on the best-effort disconnect at process exit, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_disconnect_timeout() -> u64 {
    5
}
fn default_ping_interval() -> u64 {
    30
}
fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            disconnect_timeout_secs: default_disconnect_timeout(),
            ping_interval_secs: default_ping_interval(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

/// Raw configuration as read from file and environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Selects the Config Mode (`false` → LocalOnly).
    #[serde(default, alias = "enable_sync")]
    pub enable_sync: bool,

    /// Local database file name, relative to the data dir.
    #[serde(default = "default_db_filename", alias = "db_filename")]
    pub db_filename: String,

    /// Auth service base URL.
    #[serde(default, alias = "supabase_url")]
    pub supabase_url: Option<String>,

    /// Auth service public key.
    #[serde(default, alias = "supabase_anon_key")]
    pub supabase_anon_key: Option<String>,

    /// Remote sync endpoint.
    #[serde(default, alias = "powersync_url")]
    pub powersync_url: Option<String>,

    /// Overrides the platform data dir.
    #[serde(default, alias = "data_dir")]
    pub data_dir: Option<PathBuf>,

    /// Crash reporting endpoint; reporting is off without one.
    #[serde(default, alias = "sentry_dsn")]
    pub sentry_dsn: Option<String>,

    /// Connection timeouts.
    #[serde(default)]
    pub sync: SyncSettings,
}

fn default_db_filename() -> String {
    stride_core::DEFAULT_DB_FILENAME.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_sync: false,
            db_filename: default_db_filename(),
            supabase_url: None,
            supabase_anon_key: None,
            powersync_url: None,
            data_dir: None,
            sentry_dsn: None,
            sync: SyncSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stride.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Parses a config file.
    pub fn from_file(path: &Path) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses TOML config text.
    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`. `STRIDE_*` wins over `VITE_*`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(&format!("STRIDE_{name}")).or_else(|| lookup(&format!("VITE_{name}")))
        };

        if let Some(value) = get("ENABLE_SYNC") {
            match parse_flag(&value) {
                Some(flag) => self.enable_sync = flag,
                None => warn!(value = %value, "Ignoring unparseable ENABLE_SYNC"),
            }
        }

        // LOCAL_ONLY is the inverse switch and takes precedence.
        if let Some(value) = get("LOCAL_ONLY") {
            match parse_flag(&value) {
                Some(local_only) => {
                    debug!(local_only, "Overriding sync mode from environment");
                    self.enable_sync = !local_only;
                }
                None => warn!(value = %value, "Ignoring unparseable LOCAL_ONLY"),
            }
        }

        if let Some(name) = get("DB_FILENAME") {
            self.db_filename = name;
        }
        if let Some(url) = get("SUPABASE_URL") {
            self.supabase_url = Some(url);
        }
        if let Some(key) = get("SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(key);
        }
        if let Some(url) = get("POWERSYNC_URL") {
            debug!(url = %url, "Overriding sync URL from environment");
            self.powersync_url = Some(url);
        }
        if let Some(dir) = get("DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(dsn) = get("SENTRY_DSN").or_else(|| lookup("SENTRY_DSN")) {
            self.sentry_dsn = Some(dsn).filter(|dsn| !dsn.trim().is_empty());
        }
    }

    /// Resolves the Config Mode.
    ///
    /// CloudSync with any endpoint or key missing is a fatal config error.
    pub fn resolve(&self) -> SyncResult<ConfigMode> {
        if self.db_filename.trim().is_empty() {
            return Err(SyncError::InvalidConfig("dbFilename must not be empty".into()));
        }

        if !self.enable_sync {
            return Ok(ConfigMode::LocalOnly);
        }

        let supabase_url = required(&self.supabase_url, "supabaseUrl")?;
        let supabase_anon_key = required(&self.supabase_anon_key, "supabaseAnonKey")?;
        let powersync_url = required(&self.powersync_url, "powersyncUrl")?;

        let supabase_url = parse_endpoint(supabase_url, &["http", "https"])?;
        let powersync_url = parse_endpoint(powersync_url, &["http", "https", "ws", "wss"])?;

        Ok(ConfigMode::CloudSync(CloudSyncConfig {
            supabase_url,
            supabase_anon_key: supabase_anon_key.to_string(),
            powersync_url,
        }))
    }

    /// Auth settings, if both are present. Usable in either mode.
    pub fn auth_endpoint(&self) -> SyncResult<Option<(Url, String)>> {
        match (non_empty(&self.supabase_url), non_empty(&self.supabase_anon_key)) {
            (Some(url), Some(key)) => {
                Ok(Some((parse_endpoint(url, &["http", "https"])?, key.to_string())))
            }
            _ => Ok(None),
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stride", "app")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Directory holding the database and persisted session.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(|| {
            directories::ProjectDirs::from("com", "stride", "app")
                .map(|dirs| dirs.data_dir().to_path_buf())
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> SyncResult<&'a str> {
    non_empty(value).ok_or(SyncError::MissingSetting(name))
}

fn parse_endpoint(raw: &str, schemes: &[&str]) -> SyncResult<Url> {
    let url = Url::parse(raw)?;
    if !schemes.contains(&url.scheme()) {
        return Err(SyncError::InvalidUrl(format!(
            "{} must use one of {:?}, got: {}",
            raw,
            schemes,
            url.scheme()
        )));
    }
    Ok(url)
}
