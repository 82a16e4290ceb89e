//! # Sync Commands
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Commands                                    │
//! │                                                                         │
//! │  get_sync_status()   - connection state, last error, call counts       │
//! │  get_readiness()     - db ready, auth known, gate open                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no "connect now" command: the controller decides from session
//! events alone.

use tauri::State;

use crate::state::{DbState, ReadinessDto, SyncState, SyncStatusDto};

/// Gets the current sync status.
///
/// # Returns
/// `SyncStatusDto` containing connection state, last error and call counts.
#[tauri::command]
pub fn get_sync_status(sync: State<'_, SyncState>) -> SyncStatusDto {
    sync.get_status()
}

/// Gets the readiness gate state.
#[tauri::command]
pub fn get_readiness(sync: State<'_, SyncState>, db: State<'_, DbState>) -> ReadinessDto {
    sync.readiness_view(&db)
}
