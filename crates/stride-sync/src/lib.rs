//! # stride-sync: Session & Sync Lifecycle for Stride
//!
//! This crate decides when the local store talks to the remote sync
//! service. It owns the auth session, the readiness signal the UI waits on,
//! and the one state machine allowed to open or close the sync connection.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Lifecycle Architecture                        │
//! │                                                                         │
//! │  ┌────────────────┐        ┌──────────────────────────────────────┐    │
//! │  │ AppConfig      │──────► │ ConfigMode (LocalOnly | CloudSync)   │    │
//! │  │ TOML + env     │        │ resolved once, never changes         │    │
//! │  └────────────────┘        └──────────────────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  SessionEvent   ┌──────────────────────────────┐   │
//! │  │SessionAuthority│ ──────────────► │     LifecycleController      │   │
//! │  │ + AuthProvider │  (total order)  │                              │   │
//! │  │  (GoTrue REST) │                 │  one input queue             │   │
//! │  └───────┬────────┘                 │  one in-flight call          │   │
//! │          │ access token             │  buffered intent             │   │
//! │          ▼                          └───────┬──────────────┬───────┘   │
//! │  ┌────────────────┐  connect()/disconnect() │              │           │
//! │  │ WsSyncConnector│ ◄───────────────────────┘              │           │
//! │  │  (WebSocket)   │                                        ▼           │
//! │  └────────────────┘       LocalStore ready ──► ┌──────────────────┐    │
//! │                                                │  ReadinessGate   │    │
//! │                                                │ dbReady ∧ auth   │    │
//! │                                                └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - `AppConfig` loading and `ConfigMode` resolution
//! - [`connector`] - `SyncConnector` trait and the WebSocket implementation
//! - [`controller`] - `LifecycleController` actor and its handle
//! - [`error`] - `SyncError` and `AuthError`
//! - [`readiness`] - `ReadinessGate`
//! - [`session`] - `SessionAuthority` and the `AuthProvider` trait
//! - [`supabase`] - GoTrue-compatible `AuthProvider`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stride_sync::{AppConfig, LifecycleController, SessionAuthority};
//!
//! let mode = AppConfig::load(None)?.resolve()?;
//! let authority = Arc::new(SessionAuthority::new(provider));
//!
//! let handle = LifecycleController::builder(&mode)
//!     .with_connector(connector)
//!     .build()?
//!     .spawn(&authority, store.ready_signal());
//!
//! authority.start().await;
//! handle.readiness().wait_until_ready().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod connector;
pub mod controller;
pub mod error;
pub mod readiness;
pub mod session;
pub mod supabase;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, CloudSyncConfig, ConfigMode, SyncSettings};
pub use connector::{ConnectorConfig, CredentialSource, SyncConnector, WsSyncConnector};
pub use controller::{
    ControllerPhase, ControllerStatus, LifecycleController, LifecycleControllerBuilder,
    LifecycleHandle, NoOpEmitter, SyncEventEmitter,
};
pub use error::{AuthError, AuthResult, SyncError, SyncResult};
pub use readiness::ReadinessGate;
pub use session::{
    AuthProvider, OfflineAuthProvider, SessionAuthority, SessionHandler, SessionSnapshot,
    Subscription,
};
pub use supabase::{GoTrueAuthProvider, GoTrueConfig};
