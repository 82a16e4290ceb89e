//! # Commands Module
//!
//! All Tauri commands exposed to the frontend.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs      ◄─── You are here (exports)
//! ├── auth.rs     ◄─── Sign in/up/out, password reset, auth view
//! ├── sync.rs     ◄─── Sync status and readiness
//! └── config.rs   ◄─── Configuration retrieval
//! ```
//!
//! ## How Commands Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Command Flow                                         │
//! │                                                                         │
//! │  UI                                                                     │
//! │  ──                                                                     │
//! │  const view = await invoke('sign_in', { email, password });             │
//! │         │                                                               │
//! │         │ (IPC)                                                         │
//! │         ▼                                                               │
//! │  Rust Host                                                              │
//! │  ─────────                                                              │
//! │  #[tauri::command]                                                      │
//! │  async fn sign_in(                                                      │
//! │      auth: State<AuthState>,  ◄── Injected by Tauri                    │
//! │      email: String,           ◄── From invoke params                   │
//! │      password: String,                                                  │
//! │  ) -> Result<AuthView, ApiError>                                        │
//! │         │                                                               │
//! │         │ (JSON serialization)                                          │
//! │         ▼                                                               │
//! │  UI receives: AuthView                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each command declares only the state it needs:
//! ```rust,ignore
//! async fn sign_out(auth: State<'_, AuthState>)
//! fn get_sync_status(sync: State<'_, SyncState>)
//! fn get_readiness(sync: State<'_, SyncState>, db: State<'_, DbState>)
//! ```

pub mod auth;
pub mod config;
pub mod sync;
