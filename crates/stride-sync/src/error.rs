//! # Sync Error Types
//!
//! Error types for configuration, the sync connector and auth operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Auth operations     │ │
//! │  │  (SyncError)    │  │  (SyncError)    │  │     (AuthError)         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Validation             │ │
//! │  │  MissingSetting │  │  Disconnected   │  │  InvalidCredentials     │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Provider / Network     │ │
//! │  │  ConfigLoad     │  │  NotAuthentic.  │  │  NotSignedIn            │ │
//! │  └────────┬────────┘  └────────┬────────┘  └────────────┬────────────┘ │
//! │           │                    │                        │              │
//! │     fatal at startup    absorbed by the          returned to the      │
//! │                         lifecycle controller     calling form         │
//! │                         → SyncState::Errored                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stride_core::{CoreError, ErrorInfo, SyncOperation, ValidationError};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type alias for user-initiated auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Configuration and connector failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A setting required by CloudSync mode is absent.
    #[error("{0} is required when sync is enabled")]
    MissingSetting(&'static str),

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load the config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Failed to establish the sync connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The sync connection closed unexpectedly.
    #[error("Disconnected from sync service")]
    Disconnected,

    /// Connection timeout.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    TlsError(String),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// The remote endpoint refused our credentials.
    #[error("Sync service rejected credentials: {0}")]
    Unauthorized(String),

    /// No session to authenticate the connection with.
    #[error("No signed-in session to connect with")]
    NotAuthenticated,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => SyncError::Disconnected,
            WsError::Protocol(p) => SyncError::WebSocketError(p.to_string()),
            WsError::Io(io) => SyncError::ConnectionFailed(io.to_string()),
            WsError::Tls(tls) => SyncError::TlsError(tls.to_string()),
            WsError::Url(url) => SyncError::InvalidUrl(url.to_string()),
            WsError::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
                SyncError::Unauthorized(response.status().to_string())
            }
            WsError::Http(response) => {
                SyncError::ConnectionFailed(format!("HTTP {}", response.status()))
            }
            other => SyncError::WebSocketError(other.to_string()),
        }
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if a later attempt may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectionFailed(_)
                | SyncError::Disconnected
                | SyncError::Timeout(_)
                | SyncError::WebSocketError(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingSetting(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
        )
    }

    /// Normalizes this error into the record kept in `SyncState::Errored`.
    pub fn to_error_info(&self, operation: SyncOperation) -> ErrorInfo {
        ErrorInfo::new(operation, self.to_string(), self.is_retryable())
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

/// Failures of user-initiated auth operations.
///
/// These go back to the form that started the operation; they never touch
/// the sync state.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Form input rejected before any provider call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Wrong email or password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The operation needs a signed-in session.
    #[error("You must be signed in to do that")]
    NotSignedIn,

    /// The auth service answered with an error.
    #[error("{message}")]
    Provider { status: u16, message: String },

    /// The auth service could not be reached.
    #[error("Could not reach the auth service: {0}")]
    Network(String),

    /// The auth service answered with something we could not read.
    #[error("Unexpected response from the auth service: {0}")]
    InvalidResponse(String),

    /// Auth is not configured for this installation.
    #[error("Sign-in is not available in local-only mode")]
    Unavailable,

    /// Local session storage failed.
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => AuthError::Validation(v),
            other => AuthError::InvalidResponse(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::InvalidResponse(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Disconnected.is_retryable());
        assert!(SyncError::Timeout(30).is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::NotAuthenticated.is_retryable());
        assert!(!SyncError::Unauthorized("401".into()).is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::MissingSetting("powersyncUrl").is_config_error());
        assert!(!SyncError::Disconnected.is_config_error());
        assert_eq!(
            SyncError::MissingSetting("powersyncUrl").to_string(),
            "powersyncUrl is required when sync is enabled"
        );
    }

    #[test]
    fn test_error_info_normalization() {
        let info = SyncError::Timeout(10).to_error_info(SyncOperation::Connect);
        assert_eq!(info.operation, SyncOperation::Connect);
        assert!(info.retryable);
        assert!(info.message.contains("10 seconds"));
    }

    #[test]
    fn test_auth_error_messages() {
        let err: AuthError = ValidationError::Required {
            field: "email".into(),
        }
        .into();
        assert_eq!(err.to_string(), "email is required");
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid email or password"
        );
    }
}
