//! # Stride Desktop Library
//!
//! Core library for the Stride Tauri application: startup, managed state and
//! the commands the frontend invokes.
//!
//! ## Module Organization
//! ```text
//! stride_desktop_lib/
//! ├── lib.rs          ◄─── You are here (Tauri setup, startup & shutdown)
//! ├── state/
//! │   ├── mod.rs      ◄─── State type exports
//! │   ├── auth.rs     ◄─── SessionAuthority + AuthView
//! │   ├── sync.rs     ◄─── LifecycleHandle + Tauri event emitter
//! │   ├── config.rs   ◄─── Resolved configuration
//! │   └── db.rs       ◄─── LocalStore wrapper
//! ├── commands/
//! │   ├── mod.rs      ◄─── Command exports
//! │   ├── auth.rs     ◄─── Sign in/up/out, passwords, provider pushes
//! │   ├── sync.rs     ◄─── Sync status, readiness
//! │   └── config.rs   ◄─── Configuration retrieval
//! ├── route.rs        ◄─── Which screen to show
//! └── error.rs        ◄─── API error type for commands
//! ```
//!
//! ## Events
//! - `sync:status` / `sync:error` - from the lifecycle controller
//! - `auth:changed` - the `AuthView` after any session or readiness change

pub mod commands;
pub mod error;
pub mod route;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tauri::{Emitter, Manager, RunEvent};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use state::{
    AuthState, ConfigState, DbState, SyncState, TauriSyncEventEmitter, TracingSyncEventEmitter,
};
use stride_db::{DbConfig, LocalStore, RemoteParams, StoreConfig};
use stride_sync::supabase::SESSION_FILE_NAME;
use stride_sync::{
    AppConfig, AuthError, AuthProvider, ConfigMode, ConnectorConfig, GoTrueAuthProvider,
    GoTrueConfig, LifecycleController, OfflineAuthProvider, SessionAuthority, SyncConnector,
    SyncError, SyncEventEmitter, WsSyncConnector,
};

/// Env files read at startup; earlier files win, the process env beats both.
pub const ENV_FILES: [&str; 2] = [".env", ".env.backend"];

/// Errors that stop the host from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Configuration is invalid; the only fatal class of error.
    #[error("Configuration error: {0}")]
    Config(#[from] SyncError),

    /// The auth client could not be built.
    #[error("Auth setup failed: {0}")]
    Auth(#[from] AuthError),

    /// No data directory could be determined for this platform.
    #[error("Could not determine a data directory; set STRIDE_DATA_DIR")]
    NoDataDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tauri error: {0}")]
    Tauri(#[from] tauri::Error),
}

/// Replacements for the default collaborators, used by the Tauri shell and
/// by tests.
#[derive(Default)]
pub struct Collaborators {
    pub provider: Option<Arc<dyn AuthProvider>>,
    pub connector: Option<Arc<dyn SyncConnector>>,
    pub emitter: Option<Arc<dyn SyncEventEmitter>>,
}

/// A started host: all managed state, ready for commands.
pub struct App {
    pub auth: AuthState,
    pub sync: SyncState,
    pub config: ConfigState,
    pub db: DbState,
}

impl App {
    /// Starts the host with the real network collaborators.
    pub async fn start(config: AppConfig) -> Result<App, StartupError> {
        Self::start_with(config, Collaborators::default()).await
    }

    /// Starts the host.
    ///
    /// ## Startup Sequence
    /// ```text
    /// ┌─────────────────────────────────────────────────────────────────────────┐
    /// │                       Application Startup                               │
    /// │                                                                         │
    /// │  1. Resolve Config Mode ──────────────────────────────────────────────► │
    /// │     • LocalOnly unless sync is enabled                                  │
    /// │     • CloudSync missing a setting is fatal                              │
    /// │                                                                         │
    /// │  2. Determine Database Path ──────────────────────────────────────────► │
    /// │     • STRIDE_DATA_DIR, else the platform data dir                       │
    /// │                                                                         │
    /// │  3. Start Local Store (background) ───────────────────────────────────► │
    /// │     • SQLite with WAL mode, migrations                                  │
    /// │     • Readiness flips when init settles, either way                     │
    /// │                                                                         │
    /// │  4. Session Authority ────────────────────────────────────────────────► │
    /// │     • GoTrue client when auth settings exist, offline otherwise         │
    /// │                                                                         │
    /// │  5. Lifecycle Controller ─────────────────────────────────────────────► │
    /// │     • WebSocket connector in CloudSync, none in LocalOnly               │
    /// │     • Subscribes before the startup fetch so nothing is missed          │
    /// │                                                                         │
    /// │  6. Startup Session Fetch (background) ───────────────────────────────► │
    /// │     • Emits Started(session | none)                                     │
    /// └─────────────────────────────────────────────────────────────────────────┘
    /// ```
    pub async fn start_with(
        config: AppConfig,
        collaborators: Collaborators,
    ) -> Result<App, StartupError> {
        let mode = config.resolve()?;
        info!(mode = mode.name(), "Config mode resolved");

        // Database path
        let data_dir = config.resolved_data_dir().ok_or(StartupError::NoDataDir)?;
        tokio::fs::create_dir_all(&data_dir).await?;
        let db_path = data_dir.join(&config.db_filename);
        info!(?db_path, "Database path determined");

        // Local store, initialized in the background
        let store = Arc::new(LocalStore::new(store_config(&mode, db_path.clone())));
        tokio::spawn({
            let store = store.clone();
            async move {
                // Outcome is logged by the store and read through DbState
                let _ = store.init().await;
            }
        });

        // Session authority
        let provider = match collaborators.provider {
            Some(provider) => provider,
            None => auth_provider(&config, data_dir.join(SESSION_FILE_NAME))?,
        };
        let authority = Arc::new(SessionAuthority::new(provider));

        // Lifecycle controller
        let emitter: Arc<dyn SyncEventEmitter> = match collaborators.emitter {
            Some(emitter) => emitter,
            None => Arc::new(TracingSyncEventEmitter),
        };
        let mut builder = LifecycleController::builder(&mode).with_emitter(emitter);
        if let Some(cloud) = mode.cloud() {
            let connector: Arc<dyn SyncConnector> = match collaborators.connector {
                Some(connector) => connector,
                None => Arc::new(WsSyncConnector::new(
                    ConnectorConfig::new(&cloud.powersync_url, &config.sync)?,
                    authority.clone(),
                )),
            };
            builder = builder.with_connector(connector);
        }
        let controller = builder.build()?;
        let readiness = controller.readiness();
        let handle = controller.spawn(&authority, store.ready_signal());

        tokio::spawn({
            let authority = authority.clone();
            async move {
                authority.start().await;
            }
        });

        info!("State initialized");
        Ok(App {
            auth: AuthState::new(authority, readiness),
            sync: SyncState::new(
                handle,
                Duration::from_secs(config.sync.shutdown_timeout_secs),
            ),
            config: ConfigState::new(
                &mode,
                config.db_filename.clone(),
                db_path,
                config.supabase_url.clone(),
            ),
            db: DbState::new(store),
        })
    }

    /// Resolves once the UI may leave its loading screen.
    pub async fn wait_until_ready(&self) {
        self.sync.handle().readiness().wait_until_ready().await;
    }

    /// Best-effort disconnect, bounded by the shutdown timeout.
    pub async fn shutdown(&self) {
        self.sync.stop().await;
    }

    /// Hands every state object to Tauri.
    fn manage<M: Manager<tauri::Wry>>(self, manager: &M) {
        manager.manage(self.auth);
        manager.manage(self.sync);
        manager.manage(self.config);
        manager.manage(self.db);
    }
}

fn store_config(mode: &ConfigMode, db_path: PathBuf) -> StoreConfig {
    let db = DbConfig::new(db_path);
    match mode.cloud() {
        Some(cloud) => StoreConfig::with_remote(
            db,
            RemoteParams {
                sync_url: cloud.powersync_url.to_string(),
            },
        ),
        None => StoreConfig::local_only(db),
    }
}

fn auth_provider(
    config: &AppConfig,
    session_file: PathBuf,
) -> Result<Arc<dyn AuthProvider>, StartupError> {
    match config.auth_endpoint()? {
        Some((url, anon_key)) => {
            let provider = GoTrueAuthProvider::new(GoTrueConfig {
                url,
                anon_key,
                session_file: Some(session_file),
            })?;
            Ok(Arc::new(provider))
        }
        None => {
            info!("No auth settings, sign-in disabled");
            Ok(Arc::new(OfflineAuthProvider))
        }
    }
}

/// Runs the Tauri application.
///
/// ## Startup Sequence
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  1. Initialize Logging (RUST_LOG or the default filter)                 │
/// │  2. Load .env / .env.backend from the working directory                │
/// │  3. Load AppConfig (file, then environment)                            │
/// │  4. Crash reporting, when a Sentry DSN is configured                   │
/// │  5. Tauri setup: App::start_with + manage state + auth:changed         │
/// │  6. Run until exit, then a bounded best-effort disconnect              │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn run() -> Result<(), StartupError> {
    init_tracing();

    info!("Starting Stride Desktop");

    if let Ok(dir) = std::env::current_dir() {
        for path in load_env_files(&dir) {
            info!(?path, "Loaded env file");
        }
    }

    let config = AppConfig::load(None)?;
    let _sentry = init_sentry(config.sentry_dsn.as_deref());

    let app = tauri::Builder::default()
        .setup(move |app| {
            let handle = app.handle().clone();
            let collaborators = Collaborators {
                emitter: Some(Arc::new(TauriSyncEventEmitter::new(handle.clone()))),
                ..Collaborators::default()
            };

            let host = tauri::async_runtime::block_on(async move {
                let host = App::start_with(config, collaborators).await?;
                host.auth.on_change(move |view| {
                    if let Err(e) = handle.emit("auth:changed", &view) {
                        error!(?e, "Failed to emit auth:changed event");
                    }
                });
                Ok::<_, StartupError>(host)
            })?;

            host.manage(app.handle());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Auth commands
            commands::auth::get_auth_state,
            commands::auth::get_route,
            commands::auth::sign_in,
            commands::auth::sign_up,
            commands::auth::sign_in_with_oauth,
            commands::auth::sign_out,
            commands::auth::reset_password,
            commands::auth::update_password,
            commands::auth::push_auth_event,
            // Sync commands
            commands::sync::get_sync_status,
            commands::sync::get_readiness,
            // Config commands
            commands::config::get_config,
        ])
        .build(tauri::generate_context!())?;

    app.run(|handle, event| {
        if let RunEvent::Exit = event {
            info!("Shutdown requested");
            let sync = handle.state::<SyncState>();
            tauri::async_runtime::block_on(sync.stop());
        }
    });

    Ok(())
}

/// Fills unset environment variables from the [`ENV_FILES`] in `dir`.
///
/// Returns the files that were read. Missing files are skipped; unreadable
/// ones are logged and skipped.
pub fn load_env_files(dir: &Path) -> Vec<PathBuf> {
    let mut loaded = Vec::new();
    for name in ENV_FILES {
        let path = dir.join(name);
        match dotenvy::from_path(&path) {
            Ok(()) => loaded.push(path),
            Err(e) if e.not_found() => {}
            Err(e) => warn!(?path, error = %e, "Ignoring unreadable env file"),
        }
    }
    loaded
}

/// Starts crash reporting when `dsn` is set and valid.
///
/// The guard flushes pending reports on drop, so the caller holds it for
/// the life of the app.
fn init_sentry(dsn: Option<&str>) -> Option<sentry::ClientInitGuard> {
    let dsn = match dsn?.parse::<sentry::types::Dsn>() {
        Ok(dsn) => dsn,
        Err(e) => {
            warn!(error = %e, "Invalid Sentry DSN, crash reporting disabled");
            return None;
        }
    };
    info!("Crash reporting enabled");
    Some(sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: sentry::release_name!(),
        ..Default::default()
    }))
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=stride=trace` - Show trace for stride crates only
/// - Default: INFO, DEBUG for stride crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stride=debug,sqlx=warn"));

    // A second init (e.g. an embedder already installed one) is not an error
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
