//! # Local Store
//!
//! Process-scoped owner of the embedded database with a once-only,
//! memoized initialization.
//!
//! ## Init Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       LocalStore::init()                                │
//! │                                                                         │
//! │  caller A ──┐                                                          │
//! │             ├──► OnceCell::get_or_init ──► Database::new + migrations  │
//! │  caller B ──┘         (single attempt)            │                    │
//! │                                                    ▼                    │
//! │                                       Ok(Database) | Err(DbError)      │
//! │                                                    │  memoized          │
//! │                                                    ▼                    │
//! │                                  ready signal flips to true            │
//! │                                  (success OR failure, exactly once)    │
//! │                                                                         │
//! │  later callers ──► same settled result, no reopen                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed init still flips readiness: the UI runs in degraded mode
//! instead of sitting on a loading screen forever.

use tokio::sync::{watch, OnceCell};
use tracing::{error, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};

/// `app_meta` key holding the remote sync endpoint this file mirrors.
pub const SYNC_ENDPOINT_KEY: &str = "sync_endpoint";

/// Remote parameters passed to the store in CloudSync mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteParams {
    /// Remote sync endpoint the local file replicates with.
    pub sync_url: String,
}

/// Everything `LocalStore` needs to open the database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Pool / file configuration.
    pub db: DbConfig,

    /// Remote parameters; `None` in LocalOnly mode.
    pub remote: Option<RemoteParams>,
}

impl StoreConfig {
    /// Local-only store: no remote parameters.
    pub fn local_only(db: DbConfig) -> Self {
        StoreConfig { db, remote: None }
    }

    /// Store that mirrors a remote sync endpoint.
    pub fn with_remote(db: DbConfig, remote: RemoteParams) -> Self {
        StoreConfig {
            db,
            remote: Some(remote),
        }
    }
}

/// The embedded database, initialized at most once per instance.
pub struct LocalStore {
    config: StoreConfig,
    cell: OnceCell<DbResult<Database>>,
    ready_tx: watch::Sender<bool>,
}

impl LocalStore {
    /// Creates an uninitialized store.
    pub fn new(config: StoreConfig) -> Self {
        let (ready_tx, _) = watch::channel(false);
        LocalStore {
            config,
            cell: OnceCell::new(),
            ready_tx,
        }
    }

    /// Initializes the store, or returns the already-settled result.
    ///
    /// Concurrent callers share one attempt. The ready signal flips once the
    /// attempt settles, whichever way it went.
    pub async fn init(&self) -> DbResult<Database> {
        let result = self
            .cell
            .get_or_init(|| async {
                let result = Self::open(&self.config).await;
                match &result {
                    Ok(_) => info!("Local store initialized"),
                    Err(e) => error!(error = %e, "Local store failed to initialize, continuing degraded"),
                }
                result
            })
            .await
            .clone();

        self.ready_tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });

        result
    }

    async fn open(config: &StoreConfig) -> DbResult<Database> {
        let db = Database::new(config.db.clone()).await?;

        if let Some(remote) = &config.remote {
            let previous = db.meta(SYNC_ENDPOINT_KEY).await?;
            if previous.as_deref().is_some_and(|p| p != remote.sync_url) {
                warn!(
                    previous = ?previous,
                    current = %remote.sync_url,
                    "Local store was mirroring a different sync endpoint"
                );
            }
            db.set_meta(SYNC_ENDPOINT_KEY, &remote.sync_url).await?;
        }

        Ok(db)
    }

    /// Returns the database if init settled successfully.
    pub fn database(&self) -> DbResult<Database> {
        match self.cell.get() {
            Some(Ok(db)) => Ok(db.clone()),
            Some(Err(e)) => Err(e.clone()),
            None => Err(DbError::NotInitialized),
        }
    }

    /// Returns the init failure, if init settled with one.
    pub fn init_error(&self) -> Option<DbError> {
        match self.cell.get() {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Returns true once init has settled (success or failure).
    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Subscribes to the ready signal.
    pub fn ready_signal(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    /// Returns the configuration the store was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}
