//! Lifecycle scenarios: session events, store readiness and connector calls
//! driven together through a running controller.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stride_core::{AuthSession, OAuthProvider, SignUpMetadata, SyncOperation, SyncState, UserProfile};
use stride_sync::{
    AuthProvider, AuthResult, CloudSyncConfig, ConfigMode, ControllerStatus, LifecycleController,
    LifecycleHandle, SessionAuthority, SyncConnector, SyncError, SyncResult,
};
use tokio::sync::{watch, Semaphore};
use tokio::time::{sleep, timeout};
use url::Url;

// =============================================================================
// Fakes
// =============================================================================

/// Records calls, tracks overlap, and can hold, fail or drop calls on demand.
struct ScriptedConnector {
    calls: Mutex<Vec<SyncOperation>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    failing_connects: AtomicUsize,
    failing_disconnects: AtomicUsize,
    link: watch::Sender<bool>,
    gate: Option<Semaphore>,
    delay: Duration,
}

impl ScriptedConnector {
    fn new() -> Arc<Self> {
        Arc::new(Self::build(None, Duration::ZERO))
    }

    /// Every call waits for a `release`.
    fn held() -> Arc<Self> {
        Arc::new(Self::build(Some(Semaphore::new(0)), Duration::ZERO))
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(None, delay))
    }

    fn build(gate: Option<Semaphore>, delay: Duration) -> Self {
        ScriptedConnector {
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            failing_connects: AtomicUsize::new(0),
            failing_disconnects: AtomicUsize::new(0),
            link: watch::channel(false).0,
            gate,
            delay,
        }
    }

    fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    fn fail_next_disconnects(&self, count: usize) {
        self.failing_disconnects.store(count, Ordering::SeqCst);
    }

    /// The server goes away without being asked to.
    fn drop_link(&self) {
        self.link.send_replace(false);
    }

    fn calls(&self) -> Vec<SyncOperation> {
        self.calls.lock().unwrap().clone()
    }

    fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn call(&self, op: SyncOperation) -> SyncResult<()> {
        self.calls.lock().unwrap().push(op);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        tokio::task::yield_now().await;

        self.active.fetch_sub(1, Ordering::SeqCst);

        let failing = match op {
            SyncOperation::Connect => &self.failing_connects,
            SyncOperation::Disconnect => &self.failing_disconnects,
        };
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(match op {
                SyncOperation::Connect => {
                    SyncError::ConnectionFailed("network unreachable".into())
                }
                SyncOperation::Disconnect => SyncError::Internal("close handshake failed".into()),
            });
        }

        self.link.send_replace(op == SyncOperation::Connect);
        Ok(())
    }
}

#[async_trait]
impl SyncConnector for ScriptedConnector {
    async fn connect(&self) -> SyncResult<()> {
        self.call(SyncOperation::Connect).await
    }

    async fn disconnect(&self) -> SyncResult<()> {
        self.call(SyncOperation::Disconnect).await
    }

    fn link_status(&self) -> Option<watch::Receiver<bool>> {
        Some(self.link.subscribe())
    }
}

/// Auth provider that accepts everything.
struct StubProvider {
    restore: Option<AuthSession>,
}

#[async_trait]
impl AuthProvider for StubProvider {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(self.restore.clone())
    }

    async fn sign_in(&self, email: &str, _password: &str) -> AuthResult<AuthSession> {
        Ok(user(email.split('@').next().unwrap_or(email)))
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _metadata: &SignUpMetadata,
    ) -> AuthResult<Option<AuthSession>> {
        Ok(None)
    }

    fn oauth_url(&self, provider: OAuthProvider, _redirect_to: Option<&str>) -> AuthResult<String> {
        Ok(format!("https://auth.example.com/{provider}"))
    }

    async fn sign_out(&self, _session: &AuthSession) -> AuthResult<()> {
        Ok(())
    }

    async fn reset_password(&self, _email: &str, _redirect_to: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn update_password(&self, _session: &AuthSession, _new: &str) -> AuthResult<()> {
        Ok(())
    }
}

fn user(id: &str) -> AuthSession {
    AuthSession {
        access_token: format!("token-{id}"),
        refresh_token: None,
        expires_at: None,
        user: UserProfile {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: None,
            last_name: None,
        },
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    authority: Arc<SessionAuthority>,
    handle: LifecycleHandle,
    db_tx: watch::Sender<bool>,
}

impl Harness {
    fn cloud(connector: Arc<ScriptedConnector>, restore: Option<AuthSession>) -> Self {
        Self::with_mode(cloud_mode(), connector, restore)
    }

    fn with_mode(
        mode: ConfigMode,
        connector: Arc<ScriptedConnector>,
        restore: Option<AuthSession>,
    ) -> Self {
        let authority = Arc::new(SessionAuthority::new(Arc::new(StubProvider { restore })));
        let (db_tx, db_rx) = watch::channel(false);
        let handle = LifecycleController::builder(&mode)
            .with_connector(connector)
            .build()
            .unwrap()
            .spawn(&authority, db_rx);
        Harness {
            authority,
            handle,
            db_tx,
        }
    }

    fn db_ready(&self) {
        self.db_tx.send(true).unwrap();
    }

    async fn push(&self, tag: &str, session: Option<AuthSession>) {
        self.authority
            .handle_provider_event(tag, session)
            .await
            .unwrap();
    }

    async fn wait(
        &self,
        what: &str,
        predicate: impl FnMut(&ControllerStatus) -> bool,
    ) -> ControllerStatus {
        match timeout(Duration::from_secs(5), self.handle.wait_for(predicate)).await {
            Ok(status) => status,
            Err(_) => panic!("timed out waiting for {what}: {:?}", self.handle.status()),
        }
    }

    /// Gives the actor time to act on anything still queued.
    async fn quiesce(&self) {
        sleep(Duration::from_millis(50)).await;
    }
}

fn cloud_mode() -> ConfigMode {
    ConfigMode::CloudSync(CloudSyncConfig {
        supabase_url: Url::parse("https://project.supabase.co").unwrap(),
        supabase_anon_key: "anon".into(),
        powersync_url: Url::parse("https://sync.example.com").unwrap(),
    })
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn started_none_then_db_ready_then_sign_in_connects_once() {
    let connector = ScriptedConnector::new();
    let h = Harness::cloud(connector.clone(), None);

    h.authority.start().await;
    sleep(Duration::from_millis(5)).await;
    assert!(connector.calls().is_empty());
    assert!(!h.handle.readiness().is_ready());

    h.db_ready();
    let status = h.wait("gate open", |s| s.ready).await;
    assert_eq!(status.sync_state, SyncState::Disconnected);
    assert!(connector.calls().is_empty());

    h.push("SIGNED_IN", Some(user("a"))).await;
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;
    h.quiesce().await;

    assert_eq!(connector.calls(), vec![SyncOperation::Connect]);
}

#[tokio::test]
async fn sign_out_during_connect_is_deferred_then_disconnects() {
    let connector = ScriptedConnector::held();
    let h = Harness::cloud(connector.clone(), None);
    h.db_ready();
    h.authority.start().await;

    h.push("SIGNED_IN", Some(user("a"))).await;
    h.wait("connecting", |s| s.sync_state == SyncState::Connecting)
        .await;

    h.authority.sign_out().await.unwrap();
    connector.release(2);

    let status = h
        .wait("disconnected after sign-out", |s| {
            s.disconnect_calls == 1 && s.sync_state == SyncState::Disconnected
        })
        .await;
    assert_eq!(status.connect_calls, 1);
    assert_eq!(
        connector.calls(),
        vec![SyncOperation::Connect, SyncOperation::Disconnect]
    );
    assert_eq!(connector.max_active(), 1);
}

#[tokio::test]
async fn connect_failure_errors_then_sign_in_retries_once() {
    let connector = ScriptedConnector::new();
    connector.fail_next_connects(1);
    let h = Harness::cloud(connector.clone(), None);
    h.db_ready();
    h.authority.start().await;

    h.push("SIGNED_IN", Some(user("a"))).await;
    let status = h
        .wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;
    let info = status.sync_state.error().unwrap();
    assert_eq!(info.operation, SyncOperation::Connect);
    assert!(info.retryable);
    assert_eq!(status.last_error.as_ref(), Some(info));

    // No timed retry.
    h.quiesce().await;
    assert_eq!(connector.calls(), vec![SyncOperation::Connect]);

    h.push("SIGNED_IN", Some(user("a"))).await;
    let status = h.wait("connected", |s| s.sync_state == SyncState::Connected).await;
    assert_eq!(status.connect_calls, 2);
    assert!(status.last_connected_at.is_some());
    h.quiesce().await;
    assert_eq!(
        connector.calls(),
        vec![SyncOperation::Connect, SyncOperation::Connect]
    );
}

#[tokio::test]
async fn sign_out_after_failed_connect_needs_no_call() {
    let connector = ScriptedConnector::new();
    connector.fail_next_connects(1);
    let h = Harness::cloud(connector.clone(), None);
    h.db_ready();
    h.authority.start().await;

    h.push("SIGNED_IN", Some(user("a"))).await;
    h.wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;

    h.push("SIGNED_OUT", None).await;
    h.wait("disconnected", |s| s.sync_state == SyncState::Disconnected)
        .await;
    h.quiesce().await;
    assert_eq!(connector.calls(), vec![SyncOperation::Connect]);
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn events_before_db_ready_act_on_last_intent_only() {
    struct Case {
        restore: Option<&'static str>,
        pushes: Vec<(&'static str, Option<&'static str>)>,
        expected: Vec<SyncOperation>,
    }

    let cases = vec![
        Case {
            restore: None,
            pushes: vec![("SIGNED_IN", Some("a"))],
            expected: vec![SyncOperation::Connect],
        },
        Case {
            restore: Some("a"),
            pushes: vec![("SIGNED_OUT", None)],
            expected: vec![],
        },
        Case {
            restore: Some("a"),
            pushes: vec![("SIGNED_OUT", None), ("SIGNED_IN", Some("b"))],
            expected: vec![SyncOperation::Connect],
        },
        Case {
            restore: None,
            pushes: vec![("SIGNED_IN", Some("a")), ("SIGNED_OUT", None)],
            expected: vec![],
        },
        Case {
            restore: Some("a"),
            pushes: vec![
                ("SIGNED_IN", Some("a")),
                ("SIGNED_OUT", None),
                ("SIGNED_IN", Some("a")),
            ],
            expected: vec![SyncOperation::Connect],
        },
    ];

    for (i, case) in cases.into_iter().enumerate() {
        let connector = ScriptedConnector::new();
        let h = Harness::cloud(connector.clone(), case.restore.map(user));

        h.authority.start().await;
        for (tag, session) in &case.pushes {
            h.push(tag, session.map(user)).await;
        }
        h.quiesce().await;
        assert!(connector.calls().is_empty(), "case {i}: call before db ready");

        h.db_ready();
        h.wait("gate open", |s| s.ready).await;
        h.wait("settled", |s| !s.sync_state.is_transitional()).await;
        h.quiesce().await;

        assert_eq!(connector.calls(), case.expected, "case {i}");
    }
}

#[tokio::test]
async fn connector_calls_never_overlap() {
    let connector = ScriptedConnector::slow(Duration::from_millis(2));
    let h = Harness::cloud(connector.clone(), None);
    h.db_ready();
    h.authority.start().await;

    for round in 0..20 {
        if round % 2 == 0 {
            h.push("SIGNED_IN", Some(user(if round % 4 == 0 { "a" } else { "b" }))).await;
        } else {
            h.push("SIGNED_OUT", None).await;
        }
        sleep(Duration::from_millis(1)).await;
    }
    h.push("SIGNED_OUT", None).await;

    h.wait("final disconnect", |s| s.sync_state == SyncState::Disconnected)
        .await;
    h.quiesce().await;

    let status = h.handle.status();
    assert_eq!(status.sync_state, SyncState::Disconnected);
    assert_eq!(connector.max_active(), 1);
    assert_eq!(
        connector.calls().len() as u64,
        status.connect_calls + status.disconnect_calls
    );
}

#[tokio::test]
async fn local_only_never_invokes_connector() {
    let connector = ScriptedConnector::new();
    let h = Harness::with_mode(ConfigMode::LocalOnly, connector.clone(), Some(user("a")));

    h.authority.start().await;
    h.db_ready();
    h.wait("gate open", |s| s.ready).await;

    h.push("SIGNED_OUT", None).await;
    h.authority.sign_in("b@example.com", "secret").await.unwrap();
    h.push("TOKEN_REFRESHED", Some(user("b"))).await;
    h.quiesce().await;

    let status = h.handle.status();
    assert_eq!(status.sync_state, SyncState::Disabled);
    assert!(!status.sync_enabled);
    assert!(connector.calls().is_empty());

    h.handle.shutdown().await;
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn started_then_signed_in_same_user_connects_once() {
    // Buffered before readiness.
    let connector = ScriptedConnector::new();
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.authority.start().await;
    h.push("SIGNED_IN", Some(user("a"))).await;
    h.db_ready();
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;
    h.quiesce().await;
    assert_eq!(connector.calls(), vec![SyncOperation::Connect]);

    // Arriving while the first connect is in flight, even when it fails.
    let connector = ScriptedConnector::held();
    connector.fail_next_connects(1);
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connecting", |s| s.sync_state == SyncState::Connecting)
        .await;
    h.push("SIGNED_IN", Some(user("a"))).await;
    connector.release(1);
    h.wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;
    h.quiesce().await;
    assert_eq!(connector.calls(), vec![SyncOperation::Connect]);
}

#[tokio::test]
async fn password_recovery_and_token_refresh_do_not_touch_connection() {
    let connector = ScriptedConnector::new();
    let h = Harness::cloud(connector.clone(), None);
    h.db_ready();
    h.authority.start().await;

    h.push("PASSWORD_RECOVERY", Some(user("a"))).await;
    h.push("TOKEN_REFRESHED", Some(user("a"))).await;
    h.quiesce().await;

    assert!(connector.calls().is_empty());
    assert!(h.authority.is_password_recovery());
    assert_eq!(h.handle.sync_state(), SyncState::Disconnected);
}

#[tokio::test]
async fn switching_user_reconnects() {
    let connector = ScriptedConnector::new();
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connected", |s| s.connect_calls == 1 && s.sync_state == SyncState::Connected)
        .await;

    h.push("SIGNED_IN", Some(user("b"))).await;
    h.wait("reconnected", |s| s.connect_calls == 2 && s.sync_state == SyncState::Connected)
        .await;
    assert_eq!(
        connector.calls(),
        vec![
            SyncOperation::Connect,
            SyncOperation::Disconnect,
            SyncOperation::Connect
        ]
    );
}

#[tokio::test]
async fn shutdown_disconnects_when_connected() {
    let connector = ScriptedConnector::new();
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;

    h.handle.shutdown().await;
    assert_eq!(
        connector.calls(),
        vec![SyncOperation::Connect, SyncOperation::Disconnect]
    );
    assert_eq!(h.handle.sync_state(), SyncState::Disconnected);

    // Events after shutdown are not acted on.
    h.push("SIGNED_IN", Some(user("a"))).await;
    h.quiesce().await;
    assert_eq!(connector.calls().len(), 2);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_connect() {
    let connector = ScriptedConnector::held();
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connecting", |s| s.sync_state == SyncState::Connecting)
        .await;

    let shutdown = tokio::spawn({
        let handle = h.handle.clone();
        async move { handle.shutdown().await }
    });
    sleep(Duration::from_millis(20)).await;
    assert!(!shutdown.is_finished());

    connector.release(2);
    timeout(Duration::from_secs(5), shutdown).await.unwrap().unwrap();
    assert_eq!(
        connector.calls(),
        vec![SyncOperation::Connect, SyncOperation::Disconnect]
    );
    assert_eq!(connector.max_active(), 1);
}

#[tokio::test]
async fn dropped_connection_errors_then_sign_in_reconnects() {
    let connector = ScriptedConnector::new();
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;

    connector.drop_link();
    let status = h
        .wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;
    let info = status.sync_state.error().unwrap();
    assert_eq!(info.operation, SyncOperation::Connect);
    assert!(info.retryable);
    assert_eq!(status.last_error.as_ref(), Some(info));

    // Nothing reconnects on its own.
    h.quiesce().await;
    assert_eq!(connector.calls(), vec![SyncOperation::Connect]);

    h.push("SIGNED_IN", Some(user("a"))).await;
    let status = h.wait("connected", |s| s.sync_state == SyncState::Connected).await;
    assert_eq!(status.connect_calls, 2);
    h.quiesce().await;
    assert_eq!(
        connector.calls(),
        vec![SyncOperation::Connect, SyncOperation::Connect]
    );
}

#[tokio::test]
async fn sign_out_after_dropped_connection_needs_no_call() {
    let connector = ScriptedConnector::new();
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;

    connector.drop_link();
    h.wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;

    h.push("SIGNED_OUT", None).await;
    h.wait("disconnected", |s| s.sync_state == SyncState::Disconnected)
        .await;
    h.quiesce().await;
    assert_eq!(connector.calls(), vec![SyncOperation::Connect]);
}

#[tokio::test]
async fn failed_disconnect_then_sign_out_disconnects_again() {
    let connector = ScriptedConnector::new();
    connector.fail_next_disconnects(1);
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;

    h.push("SIGNED_OUT", None).await;
    let status = h
        .wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;
    assert_eq!(
        status.sync_state.error().unwrap().operation,
        SyncOperation::Disconnect
    );

    h.push("SIGNED_OUT", None).await;
    h.wait("disconnected", |s| s.sync_state == SyncState::Disconnected)
        .await;
    h.quiesce().await;
    assert_eq!(
        connector.calls(),
        vec![
            SyncOperation::Connect,
            SyncOperation::Disconnect,
            SyncOperation::Disconnect
        ]
    );
}

#[tokio::test]
async fn sign_in_after_failed_disconnect_connects() {
    let connector = ScriptedConnector::new();
    connector.fail_next_disconnects(1);
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;

    h.push("SIGNED_OUT", None).await;
    h.wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;

    h.push("SIGNED_IN", Some(user("b"))).await;
    let status = h.wait("connected", |s| s.sync_state == SyncState::Connected).await;
    assert_eq!(status.connect_calls, 2);
    assert_eq!(
        connector.calls(),
        vec![
            SyncOperation::Connect,
            SyncOperation::Disconnect,
            SyncOperation::Connect
        ]
    );
}

#[tokio::test]
async fn shutdown_after_failed_disconnect_disconnects_again() {
    let connector = ScriptedConnector::new();
    connector.fail_next_disconnects(1);
    let h = Harness::cloud(connector.clone(), Some(user("a")));
    h.db_ready();
    h.authority.start().await;
    h.wait("connected", |s| s.sync_state == SyncState::Connected)
        .await;

    h.push("SIGNED_OUT", None).await;
    h.wait("errored", |s| matches!(s.sync_state, SyncState::Errored(_)))
        .await;

    timeout(Duration::from_secs(5), h.handle.shutdown())
        .await
        .unwrap();
    assert_eq!(h.handle.sync_state(), SyncState::Disconnected);
    assert_eq!(
        connector.calls(),
        vec![
            SyncOperation::Connect,
            SyncOperation::Disconnect,
            SyncOperation::Disconnect
        ]
    );
}

#[tokio::test]
async fn sign_out_never_settles_connected() {
    // (disconnect failures, wait for the connect before signing out)
    let cases = [(0, false), (1, false), (0, true), (2, true)];

    for (failures, after_connect) in cases {
        let connector = ScriptedConnector::new();
        connector.fail_next_disconnects(failures);
        let h = Harness::cloud(connector.clone(), None);
        h.db_ready();
        h.authority.start().await;

        h.push("SIGNED_IN", Some(user("a"))).await;
        if after_connect {
            h.wait("connected", |s| s.sync_state == SyncState::Connected)
                .await;
        }
        h.push("SIGNED_OUT", None).await;
        h.quiesce().await;

        let status = h.handle.status();
        match &status.sync_state {
            SyncState::Disconnected => {}
            SyncState::Errored(info) => assert_eq!(
                info.operation,
                SyncOperation::Disconnect,
                "case ({failures}, {after_connect})"
            ),
            other => panic!("case ({failures}, {after_connect}) ended {other}"),
        }
        assert!(connector.max_active() <= 1);
    }
}
