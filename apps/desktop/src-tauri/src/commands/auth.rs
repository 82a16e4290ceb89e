//! # Auth Commands
//!
//! ## Command Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Auth Commands                                    │
//! │                                                                         │
//! │  get_auth_state()       - session, loading, password recovery flag     │
//! │  get_route()            - which screen to show                         │
//! │  sign_in()              - email + password                             │
//! │  sign_up()              - email + password + names                     │
//! │  sign_in_with_oauth()   - returns the URL to open                      │
//! │  sign_out()             - always clears the local session              │
//! │  reset_password()       - sends a recovery email                       │
//! │  update_password()      - needs a session                              │
//! │  push_auth_event()      - deep links and refreshes from the provider   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Session changes reach the lifecycle controller through the authority's
//! event stream, never through these commands directly. The UI hears about
//! them through the `auth:changed` event.

use stride_core::{AuthSession, SignUpMetadata};
use tauri::State;
use tracing::debug;

use crate::error::ApiError;
use crate::route::Route;
use crate::state::{AuthState, AuthView};

/// Gets the current auth view.
#[tauri::command]
pub fn get_auth_state(auth: State<'_, AuthState>) -> AuthView {
    auth.view()
}

/// Gets the screen the UI should show.
#[tauri::command]
pub fn get_route(auth: State<'_, AuthState>) -> Route {
    auth.route()
}

/// Signs in with email and password.
///
/// # Example (TypeScript)
/// ```typescript
/// const view = await invoke<AuthView>('sign_in', { email, password });
/// ```
#[tauri::command]
pub async fn sign_in(
    auth: State<'_, AuthState>,
    email: String,
    password: String,
) -> Result<AuthView, ApiError> {
    debug!("sign_in command");
    auth.sign_in(&email, &password).await
}

/// Creates an account.
#[tauri::command]
pub async fn sign_up(
    auth: State<'_, AuthState>,
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<AuthView, ApiError> {
    debug!("sign_up command");
    let metadata = SignUpMetadata {
        first_name,
        last_name,
    };
    auth.sign_up(&email, &password, metadata).await
}

/// Returns the URL that starts a third-party sign-in.
#[tauri::command]
pub fn sign_in_with_oauth(
    auth: State<'_, AuthState>,
    provider: String,
    redirect_to: Option<String>,
) -> Result<String, ApiError> {
    auth.oauth_url(&provider, redirect_to.as_deref())
}

/// Signs out.
#[tauri::command]
pub async fn sign_out(auth: State<'_, AuthState>) -> Result<AuthView, ApiError> {
    debug!("sign_out command");
    auth.sign_out().await
}

/// Sends a password recovery email.
#[tauri::command]
pub async fn reset_password(
    auth: State<'_, AuthState>,
    email: String,
    redirect_to: String,
) -> Result<(), ApiError> {
    auth.reset_password(&email, &redirect_to).await
}

/// Sets a new password for the signed-in user.
#[tauri::command]
pub async fn update_password(
    auth: State<'_, AuthState>,
    new_password: String,
) -> Result<AuthView, ApiError> {
    auth.update_password(&new_password).await
}

/// Forwards an auth provider push.
///
/// `event` is one of "SIGNED_IN", "SIGNED_OUT", "PASSWORD_RECOVERY",
/// "TOKEN_REFRESHED", "INITIAL_SESSION".
#[tauri::command]
pub async fn push_auth_event(
    auth: State<'_, AuthState>,
    event: String,
    session: Option<AuthSession>,
) -> Result<AuthView, ApiError> {
    debug!(event = %event, "push_auth_event command");
    auth.push_event(&event, session).await
}
