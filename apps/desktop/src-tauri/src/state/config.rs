//! # Configuration State
//!
//! The resolved configuration the host started with.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`STRIDE_*`, then `VITE_*`)
//! 2. Config file (`stride.toml`)
//! 3. Defaults
//!
//! Read-only after startup. The anon key never leaves the host.

use std::path::PathBuf;

use serde::Serialize;
use stride_sync::ConfigMode;

/// Application configuration as shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigState {
    /// "local_only" or "cloud_sync"
    pub mode: String,

    pub sync_enabled: bool,

    /// Database file name inside the data directory
    pub db_filename: String,

    /// Full path of the database file
    pub db_path: PathBuf,

    /// Auth service URL, when configured
    pub supabase_url: Option<String>,

    /// Sync service URL (CloudSync only)
    pub powersync_url: Option<String>,
}

impl ConfigState {
    /// Builds the UI view of a resolved mode.
    pub fn new(
        mode: &ConfigMode,
        db_filename: impl Into<String>,
        db_path: PathBuf,
        supabase_url: Option<String>,
    ) -> Self {
        let cloud = mode.cloud();
        ConfigState {
            mode: mode.name().to_string(),
            sync_enabled: mode.is_cloud_sync(),
            db_filename: db_filename.into(),
            db_path,
            supabase_url: cloud
                .map(|c| c.supabase_url.to_string())
                .or(supabase_url),
            powersync_url: cloud.map(|c| c.powersync_url.to_string()),
        }
    }
}
