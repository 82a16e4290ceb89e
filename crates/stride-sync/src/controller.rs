//! # Lifecycle Controller
//!
//! Reconciles local store readiness, the auth session and the sync
//! connection into one consistent state. It is the only caller of the
//! [`SyncConnector`] and the only owner of [`SyncState`].
//!
//! ## Actor Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     LifecycleController (one task)                      │
//! │                                                                         │
//! │  SessionAuthority ──Session(event)──┐                                  │
//! │  LocalStore ready ──DbReady─────────┼──► input queue (FIFO)            │
//! │  connector task ────Settled(op, r)──┤        │                          │
//! │  connector link ────LinkClosed──────┤        │                          │
//! │  LifecycleHandle ───Shutdown(ack)───┘        ▼                          │
//! │                                     ┌──────────────────┐               │
//! │                                     │ handle each      │               │
//! │                                     │  → pending intent│ most recent   │
//! │                                     │    (one slot)    │ wins          │
//! │                                     └────────┬─────────┘               │
//! │                                              ▼                          │
//! │                                     ┌──────────────────┐               │
//! │                                     │ drive()          │ only if db    │
//! │                                     │  in-flight slot  │ ready and no  │
//! │                                     │  empty?          │ call running  │
//! │                                     └────────┬─────────┘               │
//! │                                              ▼                          │
//! │                              spawn connect()/disconnect() ──► Settled   │
//! │                                                                         │
//! │  status ──► watch channel + SyncEventEmitter                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decisions
//! ```text
//! Intent (from last event)   SyncState             Action
//! ─────────────────────────  ────────────────────  ───────────────────────────
//! Connect(user)              Disconnected/Errored  connect()
//! Connect(user)              Connected(same user)  none
//! Connect(user)              Connected(other)      disconnect(), then connect()
//! Disconnect                 Connected             disconnect()
//! Disconnect                 Errored(disconnect)   disconnect() once more
//! Disconnect                 Errored(connect)      → Disconnected, no call
//! Disconnect                 Disconnected          none
//! ```
//! `Started(Some)` and `SignedIn` both yield `Connect`; `Started(None)` and
//! `SignedOut` yield `Disconnect`. `PasswordRecovery` and `TokenRefreshed`
//! never move the connection. There is no timed retry: only a new event
//! can trigger another call.
//!
//! A connection that ends without `disconnect()` (server close, network
//! loss) turns `Connected` into `Errored(connect)`, so the next `Connect`
//! intent opens it again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use stride_core::{ErrorInfo, ReadinessSnapshot, SessionEvent, SyncOperation, SyncState};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::ConfigMode;
use crate::connector::SyncConnector;
use crate::error::{SyncError, SyncResult};
use crate::readiness::ReadinessGate;
use crate::session::{SessionAuthority, Subscription};

// =============================================================================
// Status
// =============================================================================

/// Controller phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerPhase {
    /// Built but not spawned.
    Uninitialized,

    /// Running, no `Started` event seen yet.
    AwaitingFirstEvent,

    /// Auth state known.
    Steady,
}

/// Everything the UI may want to show about the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub phase: ControllerPhase,

    /// False under LocalOnly.
    pub sync_enabled: bool,

    pub sync_state: SyncState,

    pub readiness: ReadinessSnapshot,

    /// The readiness gate is open.
    pub ready: bool,

    /// Most recent connector failure, kept after recovery.
    pub last_error: Option<ErrorInfo>,

    /// When the last successful connect settled.
    pub last_connected_at: Option<DateTime<Utc>>,

    pub connect_calls: u64,
    pub disconnect_calls: u64,
}

impl ControllerStatus {
    fn initial(sync_enabled: bool) -> Self {
        ControllerStatus {
            phase: ControllerPhase::Uninitialized,
            sync_enabled,
            sync_state: if sync_enabled {
                SyncState::Disconnected
            } else {
                SyncState::Disabled
            },
            readiness: ReadinessSnapshot::default(),
            ready: false,
            last_error: None,
            last_connected_at: None,
            connect_calls: 0,
            disconnect_calls: 0,
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives status changes and connector failures (implemented by the host).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a status change.
    fn emit_status(&self, status: &ControllerStatus);

    /// Emits a connector failure.
    fn emit_error(&self, error: &ErrorInfo);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &ControllerStatus) {}
    fn emit_error(&self, _error: &ErrorInfo) {}
}

// =============================================================================
// Controller
// =============================================================================

enum Input {
    Session(SessionEvent),
    DbReady,
    Settled {
        op: SyncOperation,
        result: SyncResult<()>,
    },
    LinkClosed,
    Shutdown(oneshot::Sender<()>),
}

/// What the most recent session event asks of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Intent {
    Connect { user_id: String },
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Call(SyncOperation),
    SwitchUser,
    ClearError,
    Nothing,
}

/// The lifecycle state machine. Build with [`LifecycleControllerBuilder`],
/// then [`spawn`](LifecycleController::spawn) it.
pub struct LifecycleController {
    connector: Option<Arc<dyn SyncConnector>>,
    /// Open/closed signal of the connector's connection, if it reports one.
    link: Option<watch::Receiver<bool>>,
    emitter: Arc<dyn SyncEventEmitter>,
    readiness: Arc<ReadinessGate>,
    status_tx: watch::Sender<ControllerStatus>,
    input_tx: mpsc::UnboundedSender<Input>,
    input_rx: mpsc::UnboundedReceiver<Input>,

    status: ControllerStatus,
    in_flight: Option<SyncOperation>,
    pending: Option<Intent>,
    /// User the open (or opening) connection belongs to.
    connection_user: Option<String>,
    shutting_down: bool,
    shutdown_acks: Vec<oneshot::Sender<()>>,
}

impl LifecycleController {
    /// Starts a builder for `mode`.
    pub fn builder(mode: &ConfigMode) -> LifecycleControllerBuilder {
        LifecycleControllerBuilder::new(mode)
    }

    fn new(
        connector: Option<Arc<dyn SyncConnector>>,
        emitter: Arc<dyn SyncEventEmitter>,
        readiness: Arc<ReadinessGate>,
    ) -> Self {
        let status = ControllerStatus::initial(connector.is_some());
        let (status_tx, _) = watch::channel(status.clone());
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let link = connector.as_ref().and_then(|c| c.link_status());

        LifecycleController {
            connector,
            link,
            emitter,
            readiness,
            status_tx,
            input_tx,
            input_rx,
            status,
            in_flight: None,
            pending: None,
            connection_user: None,
            shutting_down: false,
            shutdown_acks: Vec::new(),
        }
    }

    /// Current status (phase is `Uninitialized` until spawned).
    pub fn status(&self) -> ControllerStatus {
        self.status.clone()
    }

    /// The readiness gate this controller feeds.
    pub fn readiness(&self) -> Arc<ReadinessGate> {
        self.readiness.clone()
    }

    /// Subscribes to `authority`, watches `db_ready`, and runs the actor.
    pub fn spawn(
        self,
        authority: &SessionAuthority,
        mut db_ready: watch::Receiver<bool>,
    ) -> LifecycleHandle {
        let subscription = {
            let tx = self.input_tx.clone();
            authority.subscribe(move |event| {
                let _ = tx.send(Input::Session(event.clone()));
            })
        };

        {
            let tx = self.input_tx.clone();
            tokio::spawn(async move {
                if db_ready.wait_for(|ready| *ready).await.is_ok() {
                    let _ = tx.send(Input::DbReady);
                }
            });
        }

        if let Some(mut link) = self.link.clone() {
            let tx = self.input_tx.clone();
            tokio::spawn(async move {
                while link.changed().await.is_ok() {
                    let open = *link.borrow_and_update();
                    if !open && tx.send(Input::LinkClosed).is_err() {
                        break;
                    }
                }
            });
        }

        let handle = LifecycleHandle {
            input_tx: self.input_tx.clone(),
            status_rx: self.status_tx.subscribe(),
            readiness: self.readiness.clone(),
        };
        tokio::spawn(self.run(subscription));
        handle
    }

    async fn run(mut self, subscription: Subscription) {
        self.status.phase = ControllerPhase::AwaitingFirstEvent;
        self.publish();
        info!(sync_enabled = self.status.sync_enabled, "Lifecycle controller started");

        while let Some(input) = self.input_rx.recv().await {
            self.handle(input);
            // Collapse whatever queued up behind it before acting.
            while let Ok(input) = self.input_rx.try_recv() {
                self.handle(input);
            }

            self.drive();
            self.publish();

            if self.shutdown_complete() {
                break;
            }
        }

        drop(subscription);
        for ack in self.shutdown_acks.drain(..) {
            let _ = ack.send(());
        }
        info!(state = %self.status.sync_state, "Lifecycle controller stopped");
    }

    fn handle(&mut self, input: Input) {
        match input {
            Input::Session(event) => self.on_session_event(event),
            Input::DbReady => {
                info!("Local store settled");
                self.readiness.mark_db_ready();
            }
            Input::Settled { op, result } => self.on_settled(op, result),
            Input::LinkClosed => {
                // Mid-call closes are judged when the call settles.
                if self.in_flight.is_none()
                    && self.status.sync_state == SyncState::Connected
                    && !self.link_open()
                {
                    self.on_link_lost();
                }
            }
            Input::Shutdown(ack) => {
                self.shutdown_acks.push(ack);
                if !self.shutting_down {
                    info!("Shutting down lifecycle controller");
                    self.shutting_down = true;
                    if self.connector.is_some() {
                        self.pending = Some(Intent::Disconnect);
                    }
                }
            }
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        if self.shutting_down {
            debug!(event = event.name(), "Ignoring session event during shutdown");
            return;
        }

        let intent = match &event {
            SessionEvent::Started(session) => {
                if self.status.phase != ControllerPhase::Steady {
                    self.status.phase = ControllerPhase::Steady;
                    self.readiness.mark_auth_known();
                    info!(signed_in = session.is_some(), "Auth state known");
                }
                Some(match session {
                    Some(s) => Intent::Connect {
                        user_id: s.user_id().to_string(),
                    },
                    None => Intent::Disconnect,
                })
            }
            SessionEvent::SignedIn(s) => Some(Intent::Connect {
                user_id: s.user_id().to_string(),
            }),
            SessionEvent::SignedOut => Some(Intent::Disconnect),
            SessionEvent::PasswordRecovery(_) | SessionEvent::TokenRefreshed(_) => None,
        };

        debug!(
            event = event.name(),
            in_flight = ?self.in_flight,
            "Session event"
        );

        if self.connector.is_none() {
            return;
        }
        if let Some(intent) = intent {
            if self.in_flight.is_some() {
                debug!(?intent, "Connector call in flight, buffering");
            }
            self.pending = Some(intent);
        }
    }

    fn on_settled(&mut self, op: SyncOperation, result: SyncResult<()>) {
        if self.in_flight != Some(op) {
            warn!(operation = %op, in_flight = ?self.in_flight, "Unexpected settle");
        }
        self.in_flight = None;
        let attempted_user = self.connection_user.clone();

        match result {
            Ok(()) => match op {
                SyncOperation::Connect => {
                    self.status.sync_state = SyncState::Connected;
                    self.status.last_connected_at = Some(Utc::now());
                    info!(user_id = ?self.connection_user, "Sync connected");
                    if !self.link_open() {
                        self.on_link_lost();
                    }
                }
                SyncOperation::Disconnect => {
                    self.status.sync_state = SyncState::Disconnected;
                    self.connection_user = None;
                    info!("Sync disconnected");
                }
            },
            Err(e) => {
                let info = e.to_error_info(op);
                warn!(
                    operation = %op,
                    error = %e,
                    retryable = info.retryable,
                    "Sync connector call failed"
                );
                if op == SyncOperation::Connect {
                    self.connection_user = None;
                }
                self.emitter.emit_error(&info);
                self.status.last_error = Some(info.clone());
                self.status.sync_state = SyncState::Errored(info);
            }
        }

        // A buffered event asking for what this call just did is already served.
        let served = match (&self.pending, op) {
            (Some(Intent::Disconnect), SyncOperation::Disconnect) => true,
            (Some(Intent::Connect { user_id }), SyncOperation::Connect) => {
                attempted_user.as_deref() == Some(user_id.as_str())
            }
            _ => false,
        };
        if served {
            debug!(operation = %op, "Buffered intent served by the settled call");
            self.pending = None;
        }
    }

    fn link_open(&self) -> bool {
        self.link.as_ref().map_or(true, |link| *link.borrow())
    }

    /// The connection ended without a `disconnect()`: treat it as a failed
    /// connect so the next qualifying session event opens it again.
    fn on_link_lost(&mut self) {
        let info = SyncError::Disconnected.to_error_info(SyncOperation::Connect);
        warn!(user_id = ?self.connection_user, "Sync connection lost");
        self.connection_user = None;
        self.emitter.emit_error(&info);
        self.status.last_error = Some(info.clone());
        self.status.sync_state = SyncState::Errored(info);
    }

    /// Issues the next connector call, if one is due and allowed.
    fn drive(&mut self) {
        let Some(connector) = self.connector.clone() else {
            return;
        };
        if self.in_flight.is_some() || !self.readiness.snapshot().db_ready {
            return;
        }
        let Some(intent) = self.pending.take() else {
            return;
        };

        let action = match (&intent, &self.status.sync_state) {
            (Intent::Connect { .. }, SyncState::Disconnected | SyncState::Errored(_)) => {
                Action::Call(SyncOperation::Connect)
            }
            (Intent::Connect { user_id }, SyncState::Connected) => {
                if self.connection_user.as_deref() == Some(user_id.as_str()) {
                    Action::Nothing
                } else {
                    Action::SwitchUser
                }
            }
            (Intent::Disconnect, SyncState::Connected) => Action::Call(SyncOperation::Disconnect),
            (Intent::Disconnect, SyncState::Errored(info)) => {
                if info.operation == SyncOperation::Disconnect {
                    Action::Call(SyncOperation::Disconnect)
                } else {
                    Action::ClearError
                }
            }
            _ => Action::Nothing,
        };

        match action {
            Action::Call(op) => {
                if let Intent::Connect { user_id } = &intent {
                    self.connection_user = Some(user_id.clone());
                }
                self.start_call(connector, op);
            }
            Action::SwitchUser => {
                info!("Session user changed, reconnecting");
                self.pending = Some(intent);
                self.start_call(connector, SyncOperation::Disconnect);
            }
            Action::ClearError => {
                debug!("Signed out after a failed connect, nothing to close");
                self.status.sync_state = SyncState::Disconnected;
            }
            Action::Nothing => {
                debug!(?intent, state = %self.status.sync_state, "Already in target state");
            }
        }
    }

    fn start_call(&mut self, connector: Arc<dyn SyncConnector>, op: SyncOperation) {
        self.in_flight = Some(op);
        match op {
            SyncOperation::Connect => {
                self.status.connect_calls += 1;
                self.status.sync_state = SyncState::Connecting;
            }
            SyncOperation::Disconnect => {
                self.status.disconnect_calls += 1;
                self.status.sync_state = SyncState::Disconnecting;
            }
        }
        debug!(operation = %op, "Calling sync connector");

        let tx = self.input_tx.clone();
        tokio::spawn(async move {
            let call = tokio::spawn(async move {
                match op {
                    SyncOperation::Connect => connector.connect().await,
                    SyncOperation::Disconnect => connector.disconnect().await,
                }
            });
            let result = call
                .await
                .unwrap_or_else(|e| Err(SyncError::Internal(format!("{op} task failed: {e}"))));
            let _ = tx.send(Input::Settled { op, result });
        });
    }

    fn shutdown_complete(&self) -> bool {
        self.shutting_down
            && self.in_flight.is_none()
            && (self.pending.is_none() || !self.readiness.snapshot().db_ready)
    }

    fn publish(&mut self) {
        self.status.readiness = self.readiness.snapshot();
        self.status.ready = self.readiness.is_ready();

        let status = self.status.clone();
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status.clone();
                true
            }
        });
        if changed {
            self.emitter.emit_status(&status);
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle to a running controller.
#[derive(Clone)]
pub struct LifecycleHandle {
    input_tx: mpsc::UnboundedSender<Input>,
    status_rx: watch::Receiver<ControllerStatus>,
    readiness: Arc<ReadinessGate>,
}

impl LifecycleHandle {
    /// Latest published status.
    pub fn status(&self) -> ControllerStatus {
        self.status_rx.borrow().clone()
    }

    /// Latest published sync state.
    pub fn sync_state(&self) -> SyncState {
        self.status_rx.borrow().sync_state.clone()
    }

    /// The readiness gate.
    pub fn readiness(&self) -> &Arc<ReadinessGate> {
        &self.readiness
    }

    /// Watches status changes.
    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status_rx.clone()
    }

    /// Resolves with the first published status matching `predicate`.
    ///
    /// If the controller stops first, returns its final status.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&ControllerStatus) -> bool,
    ) -> ControllerStatus {
        let mut rx = self.status_rx.clone();
        let result = rx.wait_for(|status| predicate(status)).await.map(|s| s.clone());
        match result {
            Ok(status) => status,
            Err(_) => rx.borrow().clone(),
        }
    }

    /// Stops the controller after a best-effort disconnect.
    ///
    /// Waits for any in-flight call to settle first. Returns immediately if
    /// the controller already stopped.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.input_tx.send(Input::Shutdown(ack_tx)).is_err() {
            return;
        }
        let _ = ack_rx.await;
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for [`LifecycleController`].
pub struct LifecycleControllerBuilder {
    cloud_sync: bool,
    connector: Option<Arc<dyn SyncConnector>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
}

impl LifecycleControllerBuilder {
    /// Creates a new builder for the given mode.
    pub fn new(mode: &ConfigMode) -> Self {
        LifecycleControllerBuilder {
            cloud_sync: mode.is_cloud_sync(),
            connector: None,
            emitter: None,
        }
    }

    /// Sets the connector (CloudSync only).
    pub fn with_connector(mut self, connector: Arc<dyn SyncConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builds the controller.
    pub fn build(self) -> SyncResult<LifecycleController> {
        let connector = if self.cloud_sync {
            Some(self.connector.ok_or_else(|| {
                SyncError::InvalidConfig("CloudSync mode requires a sync connector".into())
            })?)
        } else {
            if self.connector.is_some() {
                warn!("Ignoring sync connector in LocalOnly mode");
            }
            None
        };

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));
        let readiness = Arc::new(ReadinessGate::new(self.cloud_sync));

        Ok(LifecycleController::new(connector, emitter, readiness))
    }
}
