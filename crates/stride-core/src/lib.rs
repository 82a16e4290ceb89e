//! # stride-core: Pure Domain Types for Stride
//!
//! This crate holds the types that every other Stride crate agrees on:
//! the authentication session, the ordered session events, the sync
//! connection state and the readiness snapshot. It has zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stride Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Desktop host (apps/desktop)                  │   │
//! │  │    get_auth_state, sign_in, sign_out, get_sync_status ...       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌──────────────────────┐  ┌───▼─────────────────────────────────┐     │
//! │  │  stride-db           │  │  stride-sync                        │     │
//! │  │  LocalStore (SQLite) │  │  SessionAuthority, Lifecycle ctrl   │     │
//! │  └──────────┬───────────┘  └───┬─────────────────────────────────┘     │
//! │             │                  │                                        │
//! │  ┌──────────▼──────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stride-core (THIS CRATE) ★                      │   │
//! │  │   AuthSession • SessionEvent • SyncState • ReadinessSnapshot    │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Session, event and sync-state types
//! - [`error`] - Domain error types
//! - [`validation`] - Auth form validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stride_core::{AuthEventKind, SyncState};
//!
//! let kind: AuthEventKind = "SIGNED_IN".parse().unwrap();
//! assert_eq!(kind, AuthEventKind::SignedIn);
//!
//! assert!(!SyncState::Disconnected.is_connected());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default local database file name.
pub const DEFAULT_DB_FILENAME: &str = "stride.db";

/// Minimum password length accepted by the auth provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of a first or last name.
pub const MAX_NAME_LENGTH: usize = 100;
