//! # Sync State Module
//!
//! Exposes the lifecycle controller to commands and reports its events.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync State Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      SyncState                                  │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────────┐  ┌─────────────────────────────────────┐  │   │
//! │  │  │ LifecycleHandle │  │  SyncStatusDto                      │  │   │
//! │  │  │ (actor runs in  │  │                                     │  │   │
//! │  │  │  background)    │  │  • connection_state (connected/...)│  │   │
//! │  │  │                 │  │  • last_connected_at                │  │   │
//! │  │  │  - connect      │  │  • error_message, retryable         │  │   │
//! │  │  │  - disconnect   │  │  • connect/disconnect call counts   │  │   │
//! │  │  └─────────────────┘  └─────────────────────────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │  Emits (Tauri events to the WebView):                           │   │
//! │  │  • sync:status         (SyncStatusDto)                         │   │
//! │  │  • sync:error          (ErrorInfo)                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use serde::Serialize;
use stride_core::{ErrorInfo, ReadinessSnapshot};
use stride_sync::{ControllerStatus, LifecycleHandle, SyncEventEmitter};
use tauri::{AppHandle, Emitter};
use tracing::{debug, error, info, warn};

use super::DbState;

/// Sync state shared with commands.
#[derive(Clone)]
pub struct SyncState {
    handle: LifecycleHandle,
    shutdown_timeout: Duration,
}

impl SyncState {
    pub fn new(handle: LifecycleHandle, shutdown_timeout: Duration) -> Self {
        SyncState {
            handle,
            shutdown_timeout,
        }
    }

    /// Gets the current sync status.
    pub fn get_status(&self) -> SyncStatusDto {
        SyncStatusDto::from(&self.handle.status())
    }

    /// Gets the readiness gate snapshot.
    pub fn get_readiness(&self) -> ReadinessSnapshot {
        self.handle.readiness().snapshot()
    }

    /// Readiness as shown to the UI, with the store's init failure if any.
    pub fn readiness_view(&self, db: &DbState) -> ReadinessDto {
        let snapshot = self.get_readiness();
        ReadinessDto {
            db_ready: snapshot.db_ready,
            auth_known: snapshot.auth_known,
            ready: self.handle.readiness().is_ready(),
            db_error: db.status().error,
        }
    }

    /// The controller handle.
    pub fn handle(&self) -> &LifecycleHandle {
        &self.handle
    }

    /// Stops the controller after a best-effort disconnect, giving up after
    /// the shutdown timeout.
    pub async fn stop(&self) {
        info!("Stopping sync lifecycle...");
        match tokio::time::timeout(self.shutdown_timeout, self.handle.shutdown()).await {
            Ok(()) => info!("Sync lifecycle stopped"),
            Err(_) => warn!(
                timeout_secs = self.shutdown_timeout.as_secs(),
                "Sync shutdown timed out, exiting anyway"
            ),
        }
    }
}

/// DTO for sync status that can be serialized to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusDto {
    /// Current connection state
    pub connection_state: String,

    /// False in LocalOnly mode
    pub sync_enabled: bool,

    /// Readiness gate open
    pub ready: bool,

    /// Last successful connect (RFC 3339)
    pub last_connected_at: Option<String>,

    /// Message of the last failure, if the connection is errored
    pub error_message: Option<String>,

    /// Whether retrying might help
    pub retryable: bool,

    pub connect_calls: u64,
    pub disconnect_calls: u64,
}

impl From<&ControllerStatus> for SyncStatusDto {
    fn from(status: &ControllerStatus) -> Self {
        let error = status.sync_state.error();
        SyncStatusDto {
            connection_state: status.sync_state.name().to_string(),
            sync_enabled: status.sync_enabled,
            ready: status.ready,
            last_connected_at: status.last_connected_at.map(|t| t.to_rfc3339()),
            error_message: error.map(|e| e.message.clone()),
            retryable: error.is_some_and(|e| e.retryable),
            connect_calls: status.connect_calls,
            disconnect_calls: status.disconnect_calls,
        }
    }
}

/// Readiness as shown to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessDto {
    pub db_ready: bool,
    pub auth_known: bool,
    pub ready: bool,

    /// Local store init failure, if any
    pub db_error: Option<String>,
}

/// Tauri-based sync event emitter.
///
/// Implements the SyncEventEmitter trait from stride-sync to emit events
/// to the frontend.
#[derive(Clone)]
pub struct TauriSyncEventEmitter {
    app_handle: AppHandle,
}

impl TauriSyncEventEmitter {
    pub fn new(app_handle: AppHandle) -> Self {
        TauriSyncEventEmitter { app_handle }
    }
}

impl SyncEventEmitter for TauriSyncEventEmitter {
    fn emit_status(&self, status: &ControllerStatus) {
        let dto = SyncStatusDto::from(status);
        if let Err(e) = self.app_handle.emit("sync:status", &dto) {
            error!(?e, "Failed to emit sync:status event");
        }
    }

    fn emit_error(&self, info: &ErrorInfo) {
        if let Err(e) = self.app_handle.emit("sync:error", info) {
            error!(?e, "Failed to emit sync:error event");
        }
    }
}

/// Tracing-based sync event emitter, for hosts without a WebView.
#[derive(Clone, Default)]
pub struct TracingSyncEventEmitter;

impl SyncEventEmitter for TracingSyncEventEmitter {
    fn emit_status(&self, status: &ControllerStatus) {
        let dto = SyncStatusDto::from(status);
        match serde_json::to_string(&dto) {
            Ok(payload) => debug!(event = "sync:status", %payload, "Emitted sync:status"),
            Err(e) => error!(?e, "Failed to serialize sync:status event"),
        }
    }

    fn emit_error(&self, info: &ErrorInfo) {
        error!(
            event = "sync:error",
            operation = %info.operation,
            message = %info.message,
            retryable = info.retryable,
            "Emitted sync:error"
        );
    }
}
