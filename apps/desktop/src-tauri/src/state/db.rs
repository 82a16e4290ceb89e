//! # Database State
//!
//! Wraps the [`LocalStore`] for use in commands.
//!
//! ## Thread Safety
//! `LocalStore` memoizes its init in a `OnceCell`; the `Database` it yields
//! holds a `SqlitePool`, which is thread-safe. Commands share it freely.

use std::sync::Arc;

use serde::Serialize;
use stride_db::{Database, DbResult, LocalStore};

/// Wrapper around `LocalStore` for state management.
#[derive(Clone)]
pub struct DbState {
    store: Arc<LocalStore>,
}

/// Local store status for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStatusDto {
    /// Init settled (either way)
    pub ready: bool,

    /// Init failure, if any; the app runs degraded
    pub error: Option<String>,
}

impl DbState {
    pub fn new(store: Arc<LocalStore>) -> Self {
        DbState { store }
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Returns the database once init succeeded.
    pub fn database(&self) -> DbResult<Database> {
        self.store.database()
    }

    /// Current init status.
    pub fn status(&self) -> DbStatusDto {
        DbStatusDto {
            ready: self.store.is_ready(),
            error: self.store.init_error().map(|e| e.to_string()),
        }
    }
}
