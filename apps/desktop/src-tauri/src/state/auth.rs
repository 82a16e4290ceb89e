//! # Auth State
//!
//! Wraps the [`SessionAuthority`] together with the readiness gate so that
//! one read produces everything the login surface renders.
//!
//! ## View Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SessionAuthority ──watch_snapshot()──┐                                 │
//! │                                       ├──► AuthView ──► on_change(f)    │
//! │  ReadinessGate ─────subscribe()───────┘                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde::Serialize;
use stride_core::{AuthSession, OAuthProvider, SignUpMetadata};
use stride_sync::{ReadinessGate, SessionAuthority};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::ApiError;
use crate::route::{route_for, Route};

/// Auth state shared with commands.
#[derive(Clone)]
pub struct AuthState {
    authority: Arc<SessionAuthority>,
    readiness: Arc<ReadinessGate>,
}

/// What the UI renders from.
///
/// `loading` stays true until the readiness gate opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthView {
    pub session: Option<AuthSession>,
    pub loading: bool,
    pub is_password_recovery: bool,
}

impl AuthState {
    pub fn new(authority: Arc<SessionAuthority>, readiness: Arc<ReadinessGate>) -> Self {
        AuthState {
            authority,
            readiness,
        }
    }

    /// The session authority.
    pub fn authority(&self) -> &SessionAuthority {
        &self.authority
    }

    /// Current view of the session.
    pub fn view(&self) -> AuthView {
        let snapshot = self.authority.snapshot();
        AuthView {
            session: snapshot.session,
            loading: !self.readiness.is_ready(),
            is_password_recovery: snapshot.password_recovery,
        }
    }

    /// Screen for the current view.
    pub fn route(&self) -> Route {
        route_for(&self.view())
    }

    /// Calls `f` with the new view whenever the session or readiness changes.
    ///
    /// The task holds its own references; abort the handle to stop it.
    pub fn on_change<F>(&self, f: F) -> JoinHandle<()>
    where
        F: Fn(AuthView) + Send + 'static,
    {
        let state = self.clone();
        let mut session = self.authority.watch_snapshot();
        let mut readiness = self.readiness.subscribe();
        tokio::spawn(async move {
            let mut last = None;
            loop {
                tokio::select! {
                    changed = session.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = readiness.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                let view = state.view();
                if last.as_ref() != Some(&view) {
                    last = Some(view.clone());
                    f(view);
                }
            }
        })
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Signs in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthView, ApiError> {
        debug!("sign_in");
        self.authority.sign_in(email, password).await?;
        Ok(self.view())
    }

    /// Creates an account.
    ///
    /// When the service wants the email confirmed first the returned view
    /// still has no session.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: SignUpMetadata,
    ) -> Result<AuthView, ApiError> {
        debug!("sign_up");
        self.authority.sign_up(email, password, &metadata).await?;
        Ok(self.view())
    }

    /// Returns the URL that starts a third-party sign-in.
    ///
    /// `provider` is one of "google", "github", "apple", "azure".
    pub fn oauth_url(&self, provider: &str, redirect_to: Option<&str>) -> Result<String, ApiError> {
        let provider: OAuthProvider = provider.parse()?;
        Ok(self.authority.sign_in_with_oauth(provider, redirect_to)?)
    }

    /// Signs out; the local session is cleared even if the remote call fails.
    pub async fn sign_out(&self) -> Result<AuthView, ApiError> {
        debug!("sign_out");
        self.authority.sign_out().await?;
        Ok(self.view())
    }

    /// Sends a password recovery email.
    pub async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<(), ApiError> {
        self.authority.reset_password(email, redirect_to).await?;
        Ok(())
    }

    /// Sets a new password for the signed-in user.
    pub async fn update_password(&self, new_password: &str) -> Result<AuthView, ApiError> {
        self.authority.update_password(new_password).await?;
        Ok(self.view())
    }

    /// Forwards a provider push (OAuth redirect, recovery link, refresh).
    pub async fn push_event(
        &self,
        tag: &str,
        session: Option<AuthSession>,
    ) -> Result<AuthView, ApiError> {
        self.authority.handle_provider_event(tag, session).await?;
        Ok(self.view())
    }
}
