//! # Route Decision
//!
//! Which top-level screen the UI shows for a given [`AuthView`].
//!
//! ```text
//! loading ──────────────► Loading
//! is_password_recovery ─► ResetPassword
//! no session ───────────► Login
//! otherwise ────────────► Main
//! ```
//! Checked top to bottom; the first match wins.

use serde::Serialize;

use crate::state::AuthView;

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Route {
    Loading,
    Login,
    ResetPassword,
    Main,
}

/// Picks the screen for `view`.
pub fn route_for(view: &AuthView) -> Route {
    if view.loading {
        Route::Loading
    } else if view.is_password_recovery {
        Route::ResetPassword
    } else if view.session.is_none() {
        Route::Login
    } else {
        Route::Main
    }
}
