//! # Domain Types
//!
//! Core domain types shared across Stride.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  AuthSession    │   │  SessionEvent   │   │   SyncState     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  access_token   │   │  Started        │   │  Disabled       │       │
//! │  │  refresh_token  │   │  SignedIn       │   │  Disconnected   │       │
//! │  │  expires_at     │   │  SignedOut      │   │  Connecting     │       │
//! │  │  user           │   │  PasswordRecov. │   │  Connected      │       │
//! │  └─────────────────┘   │  TokenRefreshed │   │  Disconnecting  │       │
//! │                        └─────────────────┘   │  Errored(info)  │       │
//! │  ┌─────────────────┐   ┌─────────────────┐   └─────────────────┘       │
//! │  │  UserProfile    │   │ReadinessSnapshot│                              │
//! │  │  id, email,     │   │  db_ready       │                              │
//! │  │  first/last     │   │  auth_known     │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! An `AuthSession` is owned by the session authority and is replaced on
//! every auth event, never mutated in place. Everything else receives clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// User & Session
// =============================================================================

/// Attributes of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    /// Provider-assigned user id.
    pub id: String,

    /// Primary email address.
    pub email: String,

    /// Optional first name from sign-up metadata.
    pub first_name: Option<String>,

    /// Optional last name from sign-up metadata.
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Returns "First Last", falling back to the email.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

/// An authenticated session.
///
/// The token is opaque to Stride; it is only forwarded to the sync
/// endpoint. `Debug` redacts it so sessions can be logged safely.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthSession {
    /// Bearer token for the remote service.
    pub access_token: String,

    /// Refresh token, when the provider issues one.
    pub refresh_token: Option<String>,

    /// Access token expiry.
    pub expires_at: Option<DateTime<Utc>>,

    /// The user this session belongs to.
    pub user: UserProfile,
}

impl AuthSession {
    /// Returns the id of the session's user.
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Returns true if the access token has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    /// Returns true if both sessions belong to the same user.
    pub fn same_user(&self, other: &AuthSession) -> bool {
        self.user.id == other.user.id
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Optional attributes collected by the sign-up form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SignUpMetadata {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Third-party identity providers offered on the login surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum OAuthProvider {
    Google,
    Github,
    Apple,
    Azure,
}

impl OAuthProvider {
    /// Provider name as understood by the auth service.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
            OAuthProvider::Apple => "apple",
            OAuthProvider::Azure => "azure",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            "apple" => Ok(OAuthProvider::Apple),
            "azure" => Ok(OAuthProvider::Azure),
            other => Err(CoreError::UnknownOAuthProvider(other.to_string())),
        }
    }
}

// =============================================================================
// Session Events
// =============================================================================

/// Auth event tags pushed by the underlying auth provider.
///
/// The provider speaks in strings (`"SIGNED_IN"`, ...). They are parsed into
/// this closed set once, at the session authority boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    PasswordRecovery,
    TokenRefreshed,
}

impl AuthEventKind {
    /// Wire tag for this event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEventKind::InitialSession => "INITIAL_SESSION",
            AuthEventKind::SignedIn => "SIGNED_IN",
            AuthEventKind::SignedOut => "SIGNED_OUT",
            AuthEventKind::PasswordRecovery => "PASSWORD_RECOVERY",
            AuthEventKind::TokenRefreshed => "TOKEN_REFRESHED",
        }
    }
}

impl fmt::Display for AuthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthEventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "INITIAL_SESSION" => Ok(AuthEventKind::InitialSession),
            "SIGNED_IN" => Ok(AuthEventKind::SignedIn),
            "SIGNED_OUT" => Ok(AuthEventKind::SignedOut),
            "PASSWORD_RECOVERY" => Ok(AuthEventKind::PasswordRecovery),
            "TOKEN_REFRESHED" => Ok(AuthEventKind::TokenRefreshed),
            other => Err(CoreError::UnknownAuthEvent(other.to_string())),
        }
    }
}

/// A session change, in the order the session authority produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "session", rename_all = "camelCase")]
#[ts(export)]
pub enum SessionEvent {
    /// Startup restore settled, with or without a session.
    Started(Option<AuthSession>),

    /// A user signed in.
    SignedIn(AuthSession),

    /// The user signed out.
    SignedOut,

    /// The user followed a password-recovery link.
    PasswordRecovery(AuthSession),

    /// The provider refreshed the access token.
    TokenRefreshed(AuthSession),
}

impl SessionEvent {
    /// Returns the session carried by this event, if any.
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            SessionEvent::Started(session) => session.as_ref(),
            SessionEvent::SignedIn(session)
            | SessionEvent::PasswordRecovery(session)
            | SessionEvent::TokenRefreshed(session) => Some(session),
            SessionEvent::SignedOut => None,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Started(_) => "started",
            SessionEvent::SignedIn(_) => "signed_in",
            SessionEvent::SignedOut => "signed_out",
            SessionEvent::PasswordRecovery(_) => "password_recovery",
            SessionEvent::TokenRefreshed(_) => "token_refreshed",
        }
    }

    /// Builds an event from a provider tag and the session that came with it.
    ///
    /// A `SIGNED_IN`, `PASSWORD_RECOVERY` or `TOKEN_REFRESHED` tag without a
    /// session is not a valid provider push.
    pub fn from_provider(
        kind: AuthEventKind,
        session: Option<AuthSession>,
    ) -> Result<Self, CoreError> {
        match (kind, session) {
            (AuthEventKind::InitialSession, session) => Ok(SessionEvent::Started(session)),
            (AuthEventKind::SignedOut, _) => Ok(SessionEvent::SignedOut),
            (AuthEventKind::SignedIn, Some(s)) => Ok(SessionEvent::SignedIn(s)),
            (AuthEventKind::PasswordRecovery, Some(s)) => Ok(SessionEvent::PasswordRecovery(s)),
            (AuthEventKind::TokenRefreshed, Some(s)) => Ok(SessionEvent::TokenRefreshed(s)),
            (kind, None) => Err(CoreError::MissingSession(kind.as_str().to_string())),
        }
    }
}

// =============================================================================
// Sync State
// =============================================================================

/// Which connector call an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SyncOperation {
    Connect,
    Disconnect,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOperation::Connect => write!(f, "connect"),
            SyncOperation::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// A normalized sync failure, safe to hand to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ErrorInfo {
    /// The call that failed.
    pub operation: SyncOperation,

    /// Human-readable description.
    pub message: String,

    /// Whether a later qualifying event is likely to succeed.
    pub retryable: bool,

    /// When the failure was observed.
    pub at: DateTime<Utc>,
}

impl ErrorInfo {
    /// Creates an error record stamped with the current time.
    pub fn new(operation: SyncOperation, message: impl Into<String>, retryable: bool) -> Self {
        ErrorInfo {
            operation,
            message: message.into(),
            retryable,
            at: Utc::now(),
        }
    }
}

/// State of the live sync connection.
///
/// ## Transitions (CloudSync)
/// ```text
/// Disconnected ──connect()──► Connecting ──ok──► Connected
///      ▲                          │                  │
///      │                         err           disconnect()
///      │                          ▼                  ▼
///      └────────ok──────── Errored(info) ◄──err── Disconnecting
/// ```
/// `Disabled` is the permanent state under LocalOnly and is never exited.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(tag = "state", content = "error", rename_all = "camelCase")]
#[ts(export)]
pub enum SyncState {
    Disabled,
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Errored(ErrorInfo),
}

impl SyncState {
    /// Returns true if the connection is live.
    pub fn is_connected(&self) -> bool {
        matches!(self, SyncState::Connected)
    }

    /// Returns true while a connector call is outstanding.
    pub fn is_transitional(&self) -> bool {
        matches!(self, SyncState::Connecting | SyncState::Disconnecting)
    }

    /// Returns the error, if the last call failed.
    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            SyncState::Errored(info) => Some(info),
            _ => None,
        }
    }

    /// Short name for logging and the UI.
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Disabled => "disabled",
            SyncState::Disconnected => "disconnected",
            SyncState::Connecting => "connecting",
            SyncState::Connected => "connected",
            SyncState::Disconnecting => "disconnecting",
            SyncState::Errored(_) => "errored",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Readiness
// =============================================================================

/// The two facts the UI waits on before becoming interactive.
///
/// Both flags are monotonic: once true they stay true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReadinessSnapshot {
    /// Local store initialization settled (success or failure).
    pub db_ready: bool,

    /// The first `Started` session event was observed.
    pub auth_known: bool,
}

impl ReadinessSnapshot {
    /// Returns true if the UI may leave its loading state.
    ///
    /// When auth is not required (LocalOnly) only the store matters.
    pub fn is_ready(&self, require_auth: bool) -> bool {
        self.db_ready && (self.auth_known || !require_auth)
    }
}
