//! # Error Types
//!
//! Domain-specific error types for stride-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stride-core errors (this file)                                        │
//! │  ├── CoreError        - Unknown tags, malformed provider pushes        │
//! │  └── ValidationError  - Auth form input failures                       │
//! │                                                                         │
//! │  stride-db errors (separate crate)                                     │
//! │  └── DbError          - Local store failures                           │
//! │                                                                         │
//! │  stride-sync errors (separate crate)                                   │
//! │  ├── SyncError        - Config + connector failures                    │
//! │  └── AuthError        - User-initiated auth operation failures         │
//! │                                                                         │
//! │  Desktop host                                                          │
//! │  └── ApiError         - What the UI sees (serialized)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while interpreting data at the domain boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The auth provider pushed an event tag we do not know.
    #[error("Unknown auth event: {0}")]
    UnknownAuthEvent(String),

    /// An OAuth provider name we do not offer.
    #[error("Unknown OAuth provider: {0}")]
    UnknownOAuthProvider(String),

    /// The provider pushed an event that must carry a session, without one.
    #[error("Auth event {0} arrived without a session")]
    MissingSession(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any provider call so the form can show the message
/// without a round trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
