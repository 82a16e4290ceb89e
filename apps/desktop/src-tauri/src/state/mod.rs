//! # State Module
//!
//! Manages application state for the desktop host.
//!
//! ## Why Multiple State Types?
//! Each command declares exactly the state it needs instead of reaching
//! into one `AppState` struct.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   Tauri setup (app.manage)                      │   │
//! │  │  App::start builds each state once; commands take State<'_, T>  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                              │                                          │
//! │     ┌──────────────┬─────────┴────────┬──────────────────┐             │
//! │     ▼              ▼                  ▼                  ▼              │
//! │  ┌──────────┐ ┌──────────────┐ ┌──────────────┐ ┌──────────────┐       │
//! │  │AuthState │ │  SyncState   │ │ ConfigState  │ │   DbState    │       │
//! │  │          │ │              │ │              │ │              │       │
//! │  │ Session  │ │ Lifecycle    │ │ mode, paths  │ │ LocalStore   │       │
//! │  │ Authority│ │ Handle       │ │ endpoints    │ │ (memoized)   │       │
//! │  └──────────┘ └──────────────┘ └──────────────┘ └──────────────┘       │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • AuthState: SessionAuthority locks internally                        │
//! │  • SyncState: watch receiver, the actor owns all mutation              │
//! │  • ConfigState: read-only after startup                                │
//! │  • DbState: OnceCell inside LocalStore                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod auth;
mod config;
mod db;
mod sync;

pub use auth::{AuthState, AuthView};
pub use config::ConfigState;
pub use db::{DbState, DbStatusDto};
pub use sync::{
    ReadinessDto, SyncState, SyncStatusDto, TauriSyncEventEmitter, TracingSyncEventEmitter,
};
