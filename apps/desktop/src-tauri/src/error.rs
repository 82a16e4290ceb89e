//! # API Error Type
//!
//! Unified error type for all Tauri commands.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Stride                                 │
//! │                                                                         │
//! │  UI                          Rust Host                                  │
//! │  ──                          ─────────                                  │
//! │                                                                         │
//! │  invoke('sign_in')                                                      │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  #[tauri::command]                                               │  │
//! │  │  Result<T, ApiError>                                             │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Form input bad? ──── AuthError::Validation ──────┐             │  │
//! │  │         │                                          │             │  │
//! │  │         ▼                                          ▼             │  │
//! │  │  Provider failed? ─── AuthError::Provider ────── ApiError ─────►│  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  try {                                                                  │
//! │    await invoke('sign_in', { email, password })                         │
//! │  } catch (e) {                                                          │
//! │    // e.message = "Invalid email or password"                           │
//! │    // e.code = "INVALID_CREDENTIALS"                                    │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! Errors cross the IPC boundary as JSON, so `ApiError` implements
//! `Serialize` with a machine-readable `code` and a human-readable `message`.

use serde::Serialize;
use stride_core::CoreError;
use stride_db::DbError;
use stride_sync::{AuthError, SyncError};

/// API error returned from Tauri commands.
///
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "message": "password must be at least 6 characters"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed
    ValidationError,

    /// Wrong email or password
    InvalidCredentials,

    /// The operation needs a signed-in session
    NotSignedIn,

    /// Auth is not configured (LocalOnly without auth settings)
    AuthUnavailable,

    /// The auth service failed or could not be reached
    AuthError,

    /// Local store failed
    DatabaseError,

    /// Configuration is invalid
    ConfigError,

    /// Sync connection failed
    SyncError,

    /// Internal error
    Internal,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

/// Converts auth operation errors to API errors.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(e) => ApiError::validation(e.to_string()),
            AuthError::InvalidCredentials => {
                ApiError::new(ErrorCode::InvalidCredentials, err.to_string())
            }
            AuthError::NotSignedIn => ApiError::new(ErrorCode::NotSignedIn, err.to_string()),
            AuthError::Unavailable => ApiError::new(ErrorCode::AuthUnavailable, err.to_string()),
            AuthError::Provider { .. } | AuthError::Network(_) => {
                ApiError::new(ErrorCode::AuthError, err.to_string())
            }
            AuthError::InvalidResponse(ref e) | AuthError::Storage(ref e) => {
                // Log the detail, show a generic message
                tracing::error!(error = %e, "Auth operation failed");
                ApiError::new(ErrorCode::AuthError, "Authentication failed")
            }
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotInitialized => {
                ApiError::new(ErrorCode::DatabaseError, "Local store is still starting")
            }
            DbError::ConnectionFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::PoolExhausted => {
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::QueryFailed(e) | DbError::Internal(e) => {
                tracing::error!("Database operation failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
            // Provider names and pushed events both come from the UI.
            CoreError::UnknownOAuthProvider(_)
            | CoreError::UnknownAuthEvent(_)
            | CoreError::MissingSession(_) => ApiError::validation(err.to_string()),
        }
    }
}

/// Converts sync errors to API errors.
impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        if err.is_config_error() {
            ApiError::new(ErrorCode::ConfigError, err.to_string())
        } else {
            ApiError::new(ErrorCode::SyncError, err.to_string())
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
