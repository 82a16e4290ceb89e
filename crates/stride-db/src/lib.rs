//! # stride-db: Local Store for Stride
//!
//! This crate provides the embedded database the application always runs
//! against, whether or not a remote sync connection exists.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stride Startup Flow                              │
//! │                                                                         │
//! │  Desktop host startup                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     stride-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalStore   │    │   Database    │    │  Migrations  │  │   │
//! │  │   │  (store.rs)   │───►│   (pool.rs)   │───►│  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ once-only     │    │ SqlitePool    │    │ 001_initial  │  │   │
//! │  │   │ init + ready  │    │ app_meta      │    │ _schema.sql  │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ ready signal (watch<bool>)                          │   │
//! │  └───────────┼─────────────────────────────────────────────────────┘   │
//! │              ▼                                                          │
//! │  LifecycleController / ReadinessGate (stride-sync)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`store`] - Memoized `LocalStore` and its readiness signal
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stride_db::{DbConfig, LocalStore, StoreConfig};
//!
//! let store = LocalStore::new(StoreConfig::local_only(DbConfig::new("stride.db")));
//! let db = store.init().await?;       // first call opens + migrates
//! let again = store.init().await?;    // no-op, same result
//! assert!(store.is_ready());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{LocalStore, RemoteParams, StoreConfig};
