//! # Session Authority
//!
//! Sole owner of the current authentication session. Every change goes out
//! as a [`SessionEvent`] to each subscriber, in the order it happened.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SessionAuthority                                │
//! │                                                                         │
//! │   start() ──► provider.current_session() ──► Started(Some|None)        │
//! │                        (fails → Started(None))        │                 │
//! │                                                       │                 │
//! │   sign_in / sign_up ──► SignedIn(session) ────────────┤                 │
//! │   sign_out          ──► SignedOut ────────────────────┤                 │
//! │   provider push     ──► SIGNED_IN | SIGNED_OUT |      │                 │
//! │   (tag, session)        PASSWORD_RECOVERY |           │                 │
//! │                         TOKEN_REFRESHED ──────────────┤                 │
//! │                                                       ▼                 │
//! │                                   ┌──────────────────────────────┐     │
//! │                                   │ registry lock (total order)  │     │
//! │                                   │  subscriber 1 ◄── event      │     │
//! │                                   │  subscriber 2 ◄── event      │     │
//! │                                   └──────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events produced before the startup fetch settles are held and delivered
//! right after `Started`, so every subscriber sees `Started` first. A
//! subscriber that joins after startup immediately receives
//! `Started(current)`.
//!
//! Handlers run while the registry lock is held. They must be quick and
//! must not call back into the authority; forward into a channel instead.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use stride_core::validation::{validate_email, validate_password, validate_sign_up_metadata};
use stride_core::{
    AuthEventKind, AuthSession, CoreResult, OAuthProvider, SessionEvent, SignUpMetadata,
    ValidationError,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::connector::CredentialSource;
use crate::error::{AuthError, AuthResult};

// =============================================================================
// Auth Provider
// =============================================================================

/// The remote identity service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Restores the persisted session, if any.
    async fn current_session(&self) -> AuthResult<Option<AuthSession>>;

    /// Password sign-in.
    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession>;

    /// Registers a user. `None` when the provider requires email confirmation.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> AuthResult<Option<AuthSession>>;

    /// Builds the URL that starts a third-party sign-in.
    fn oauth_url(&self, provider: OAuthProvider, redirect_to: Option<&str>) -> AuthResult<String>;

    /// Revokes the session remotely and forgets it locally.
    async fn sign_out(&self, session: &AuthSession) -> AuthResult<()>;

    /// Sends a password-reset email.
    async fn reset_password(&self, email: &str, redirect_to: &str) -> AuthResult<()>;

    /// Changes the password of the session's user.
    async fn update_password(&self, session: &AuthSession, new_password: &str) -> AuthResult<()>;

    /// Keeps a session that arrived by push so the next start restores it.
    /// `None` forgets the stored one.
    async fn store_session(&self, _session: Option<&AuthSession>) -> AuthResult<()> {
        Ok(())
    }
}

/// Provider for installations with no auth endpoint configured.
///
/// Startup restores no session; every user operation is `Unavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAuthProvider;

#[async_trait]
impl AuthProvider for OfflineAuthProvider {
    async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
        Ok(None)
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> AuthResult<AuthSession> {
        Err(AuthError::Unavailable)
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        _metadata: &SignUpMetadata,
    ) -> AuthResult<Option<AuthSession>> {
        Err(AuthError::Unavailable)
    }

    fn oauth_url(&self, _provider: OAuthProvider, _redirect_to: Option<&str>) -> AuthResult<String> {
        Err(AuthError::Unavailable)
    }

    async fn sign_out(&self, _session: &AuthSession) -> AuthResult<()> {
        Ok(())
    }

    async fn reset_password(&self, _email: &str, _redirect_to: &str) -> AuthResult<()> {
        Err(AuthError::Unavailable)
    }

    async fn update_password(&self, _session: &AuthSession, _new_password: &str) -> AuthResult<()> {
        Err(AuthError::Unavailable)
    }
}

// =============================================================================
// Subscriptions
// =============================================================================

/// A subscriber callback.
pub type SessionHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// What the UI needs to know about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// The startup fetch has settled and `Started` went out.
    pub started: bool,

    /// Current session, `None` when signed out.
    pub session: Option<AuthSession>,

    /// A recovery link was followed and the password is not yet updated.
    pub password_recovery: bool,
}

struct Registry {
    snapshot: SessionSnapshot,
    held: Vec<SessionEvent>,
    subscribers: Vec<(u64, SessionHandler)>,
    next_id: u64,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a handler registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribes now.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).subscribers.retain(|(id, _)| *id != self.id);
            debug!(subscriber = self.id, "Session subscriber removed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// =============================================================================
// Session Authority
// =============================================================================

/// Holds the current session and broadcasts its changes.
pub struct SessionAuthority {
    provider: Arc<dyn AuthProvider>,
    registry: Arc<Mutex<Registry>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionAuthority {
    /// Creates an authority that has not fetched its startup session yet.
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        SessionAuthority {
            provider,
            registry: Arc::new(Mutex::new(Registry {
                snapshot: SessionSnapshot::default(),
                held: Vec::new(),
                subscribers: Vec::new(),
                next_id: 0,
            })),
            snapshot_tx,
        }
    }

    /// Fetches the persisted session and emits `Started`.
    ///
    /// A failed fetch still emits `Started(None)`. Calling this again after
    /// it settled returns the current session without emitting anything.
    pub async fn start(&self) -> Option<AuthSession> {
        {
            let registry = lock(&self.registry);
            if registry.snapshot.started {
                return registry.snapshot.session.clone();
            }
        }

        let restored = match self.provider.current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Session restore failed, starting signed out");
                None
            }
        };

        let mut registry = lock(&self.registry);
        if registry.snapshot.started {
            return registry.snapshot.session.clone();
        }
        registry.snapshot.started = true;

        self.apply_and_deliver(&mut registry, SessionEvent::Started(restored));
        let held = std::mem::take(&mut registry.held);
        if !held.is_empty() {
            debug!(count = held.len(), "Flushing session events held during startup");
        }
        for event in held {
            self.apply_and_deliver(&mut registry, event);
        }

        info!(
            signed_in = registry.snapshot.session.is_some(),
            user_id = registry.snapshot.session.as_ref().map(|s| s.user_id()),
            "Session authority started"
        );
        registry.snapshot.session.clone()
    }

    /// Registers `handler` for every subsequent event.
    ///
    /// If startup already settled, the handler first receives
    /// `Started(current)`.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let handler: SessionHandler = Arc::new(handler);
        let mut registry = lock(&self.registry);

        let id = registry.next_id;
        registry.next_id += 1;

        if registry.snapshot.started {
            handler(&SessionEvent::Started(registry.snapshot.session.clone()));
        }
        registry.subscribers.push((id, handler));
        debug!(subscriber = id, "Session subscriber added");

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    fn emit(&self, event: SessionEvent) {
        let mut registry = lock(&self.registry);
        if !registry.snapshot.started {
            debug!(event = event.name(), "Holding session event until startup settles");
            registry.held.push(event);
            return;
        }
        self.apply_and_deliver(&mut registry, event);
    }

    fn apply_and_deliver(&self, registry: &mut Registry, event: SessionEvent) {
        let snapshot = &mut registry.snapshot;
        match &event {
            SessionEvent::Started(session) => snapshot.session = session.clone(),
            SessionEvent::SignedIn(session) | SessionEvent::TokenRefreshed(session) => {
                snapshot.session = Some(session.clone());
            }
            SessionEvent::PasswordRecovery(session) => {
                snapshot.session = Some(session.clone());
                snapshot.password_recovery = true;
            }
            SessionEvent::SignedOut => {
                snapshot.session = None;
                snapshot.password_recovery = false;
            }
        }
        self.snapshot_tx.send_replace(registry.snapshot.clone());

        debug!(
            event = event.name(),
            subscribers = registry.subscribers.len(),
            "Delivering session event"
        );
        for (_, handler) in &registry.subscribers {
            handler(&event);
        }
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    /// Signs in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::Required {
                field: "password".into(),
            }
            .into());
        }

        let session = self.provider.sign_in(&email, password).await?;
        info!(user_id = %session.user_id(), "Signed in");
        self.emit(SessionEvent::SignedIn(session.clone()));
        Ok(session)
    }

    /// Registers a new user.
    ///
    /// Returns `None` when the provider wants the email confirmed first; no
    /// event is emitted in that case.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> AuthResult<Option<AuthSession>> {
        let email = validate_email(email)?;
        validate_password(password)?;
        let metadata = validate_sign_up_metadata(metadata)?;

        let session = self.provider.sign_up(&email, password, &metadata).await?;
        match &session {
            Some(session) => {
                info!(user_id = %session.user_id(), "Signed up");
                self.emit(SessionEvent::SignedIn(session.clone()));
            }
            None => info!("Signed up, awaiting email confirmation"),
        }
        Ok(session)
    }

    /// Returns the URL that starts a third-party sign-in.
    ///
    /// The session arrives later as a `SIGNED_IN` provider push.
    pub fn sign_in_with_oauth(
        &self,
        provider: OAuthProvider,
        redirect_to: Option<&str>,
    ) -> AuthResult<String> {
        let url = self.provider.oauth_url(provider, redirect_to)?;
        debug!(provider = %provider, "OAuth sign-in started");
        Ok(url)
    }

    /// Signs out.
    ///
    /// The local session is cleared and `SignedOut` emitted even when the
    /// remote revoke fails.
    pub async fn sign_out(&self) -> AuthResult<()> {
        if let Some(session) = self.current_session() {
            if let Err(e) = self.provider.sign_out(&session).await {
                warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
            }
        }
        info!("Signed out");
        self.emit(SessionEvent::SignedOut);
        Ok(())
    }

    /// Sends a password-reset email.
    pub async fn reset_password(&self, email: &str, redirect_to: &str) -> AuthResult<()> {
        let email = validate_email(email)?;
        self.provider.reset_password(&email, redirect_to).await?;
        info!("Password reset requested");
        Ok(())
    }

    /// Changes the signed-in user's password and leaves recovery mode.
    pub async fn update_password(&self, new_password: &str) -> AuthResult<()> {
        validate_password(new_password)?;
        let session = self.current_session().ok_or(AuthError::NotSignedIn)?;

        self.provider.update_password(&session, new_password).await?;

        let mut registry = lock(&self.registry);
        if registry.snapshot.password_recovery {
            registry.snapshot.password_recovery = false;
            self.snapshot_tx.send_replace(registry.snapshot.clone());
        }
        info!(user_id = %session.user_id(), "Password updated");
        Ok(())
    }

    /// Entry point for provider pushes (deep links, token refresh).
    ///
    /// Unknown tags are logged and returned as an error; nothing is emitted.
    /// The pushed session is stored with the provider after it is emitted;
    /// a failed store is logged and does not undo the event.
    pub async fn handle_provider_event(
        &self,
        tag: &str,
        session: Option<AuthSession>,
    ) -> CoreResult<()> {
        let kind: AuthEventKind = tag.parse().inspect_err(|_| {
            warn!(tag, "Ignoring unknown auth event");
        })?;

        if kind == AuthEventKind::InitialSession {
            // Started comes from start(); a pushed initial session adds nothing.
            debug!("Ignoring pushed INITIAL_SESSION");
            return Ok(());
        }

        let event = SessionEvent::from_provider(kind, session).inspect_err(|e| {
            warn!(error = %e, "Ignoring malformed auth event");
        })?;
        let stored = event.session().cloned();
        let name = event.name();
        self.emit(event);

        if let Err(e) = self.provider.store_session(stored.as_ref()).await {
            warn!(event = name, error = %e, "Failed to store pushed session");
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current session.
    pub fn current_session(&self) -> Option<AuthSession> {
        lock(&self.registry).snapshot.session.clone()
    }

    /// Returns true once `Started` went out.
    pub fn is_started(&self) -> bool {
        lock(&self.registry).snapshot.started
    }

    /// Returns true while in password recovery.
    pub fn is_password_recovery(&self) -> bool {
        lock(&self.registry).snapshot.password_recovery
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.registry).snapshot.clone()
    }

    /// Watches snapshot changes.
    pub fn watch_snapshot(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }
}

impl CredentialSource for SessionAuthority {
    fn access_token(&self) -> Option<String> {
        self.current_session().map(|s| s.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::UserProfile;

    fn session(id: &str) -> AuthSession {
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

    #[derive(Default)]
    struct FakeProvider {
        restore: Mutex<Option<AuthResult<Option<AuthSession>>>>,
        sign_up_session: bool,
        fail_sign_out: bool,
        calls: Mutex<Vec<String>>,
        stored: Mutex<Vec<Option<String>>>,
    }

    impl FakeProvider {
        fn restoring(result: AuthResult<Option<AuthSession>>) -> Self {
            FakeProvider {
                restore: Mutex::new(Some(result)),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl AuthProvider for FakeProvider {
        async fn current_session(&self) -> AuthResult<Option<AuthSession>> {
            self.record("current_session");
            self.restore.lock().unwrap().take().unwrap_or(Ok(None))
        }

        async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
            self.record("sign_in");
            if password == "wrong" {
                return Err(AuthError::InvalidCredentials);
            }
            Ok(session(email.split('@').next().unwrap()))
        }

        async fn sign_up(
            &self,
            email: &str,
            _password: &str,
            _metadata: &SignUpMetadata,
        ) -> AuthResult<Option<AuthSession>> {
            self.record("sign_up");
            Ok(self
                .sign_up_session
                .then(|| session(email.split('@').next().unwrap())))
        }

        fn oauth_url(&self, provider: OAuthProvider, _redirect_to: Option<&str>) -> AuthResult<String> {
            Ok(format!("https://auth.example.com/authorize?provider={provider}"))
        }

        async fn sign_out(&self, _session: &AuthSession) -> AuthResult<()> {
            self.record("sign_out");
            if self.fail_sign_out {
                return Err(AuthError::Network("offline".into()));
            }
            Ok(())
        }

        async fn reset_password(&self, _email: &str, _redirect_to: &str) -> AuthResult<()> {
            self.record("reset_password");
            Ok(())
        }

        async fn update_password(&self, _session: &AuthSession, _new: &str) -> AuthResult<()> {
            self.record("update_password");
            Ok(())
        }

        async fn store_session(&self, session: Option<&AuthSession>) -> AuthResult<()> {
            self.stored
                .lock()
                .unwrap()
                .push(session.map(|s| s.access_token.clone()));
            Ok(())
        }
    }

    fn recorder(authority: &SessionAuthority) -> (Arc<Mutex<Vec<SessionEvent>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = authority.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        (seen, sub)
    }

    #[tokio::test]
    async fn test_start_restores_session() {
        let authority =
            SessionAuthority::new(Arc::new(FakeProvider::restoring(Ok(Some(session("ada"))))));
        let (seen, _sub) = recorder(&authority);

        let restored = authority.start().await;
        assert_eq!(restored, Some(session("ada")));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionEvent::Started(Some(session("ada")))]
        );

        // Second start is a no-op.
        authority.start().await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_restore_still_emits_started() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::restoring(Err(
            AuthError::Network("offline".into()),
        ))));
        let (seen, _sub) = recorder(&authority);

        assert_eq!(authority.start().await, None);
        assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Started(None)]);
        assert!(authority.is_started());
    }

    #[tokio::test]
    async fn test_events_before_start_are_held() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        let (seen, _sub) = recorder(&authority);

        authority.sign_in("ada@example.com", "secret").await.unwrap();
        assert!(seen.lock().unwrap().is_empty());

        authority.start().await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SessionEvent::Started(None),
                SessionEvent::SignedIn(session("ada")),
            ]
        );
        assert_eq!(authority.current_session(), Some(session("ada")));
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_started_first() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        authority.start().await;
        authority.sign_in("ada@example.com", "secret").await.unwrap();

        let (seen, _sub) = recorder(&authority);
        authority.sign_out().await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SessionEvent::Started(Some(session("ada"))),
                SessionEvent::SignedOut,
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_subscription_stops_delivery() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        authority.start().await;

        let (seen, sub) = recorder(&authority);
        sub.unsubscribe();
        authority.sign_in("ada@example.com", "secret").await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![SessionEvent::Started(None)]);
    }

    #[tokio::test]
    async fn test_each_subscriber_sees_same_order() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        let (first, _a) = recorder(&authority);
        let (second, _b) = recorder(&authority);

        authority.start().await;
        authority.sign_in("ada@example.com", "secret").await.unwrap();
        authority.sign_out().await.unwrap();

        assert_eq!(first.lock().unwrap().len(), 3);
        assert_eq!(*first.lock().unwrap(), *second.lock().unwrap());
    }

    #[tokio::test]
    async fn test_sign_in_validates_before_provider_call() {
        let provider = Arc::new(FakeProvider::default());
        let authority = SessionAuthority::new(provider.clone());

        let err = authority.sign_in("not-an-email", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        let err = authority.sign_in("ada@example.com", "").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        assert!(provider.calls().is_empty());

        let err = authority.sign_in("ada@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(authority.current_session(), None);
    }

    #[tokio::test]
    async fn test_sign_up_without_session_emits_nothing() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        authority.start().await;
        let (seen, _sub) = recorder(&authority);

        let result = authority
            .sign_up("ada@example.com", "secret1", &SignUpMetadata::default())
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(seen.lock().unwrap().len(), 1);

        let err = authority
            .sign_up("ada@example.com", "123", &SignUpMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_if_remote_fails() {
        let provider = Arc::new(FakeProvider {
            fail_sign_out: true,
            ..Default::default()
        });
        let authority = SessionAuthority::new(provider.clone());
        authority.start().await;
        authority.sign_in("ada@example.com", "secret").await.unwrap();

        authority.sign_out().await.unwrap();
        assert_eq!(authority.current_session(), None);
        assert_eq!(provider.calls(), vec!["current_session", "sign_in", "sign_out"]);
    }

    #[tokio::test]
    async fn test_password_recovery_flag() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        authority.start().await;

        authority
            .handle_provider_event("PASSWORD_RECOVERY", Some(session("ada")))
            .await
            .unwrap();
        assert!(authority.is_password_recovery());
        assert_eq!(authority.current_session(), Some(session("ada")));

        authority.update_password("new-secret").await.unwrap();
        assert!(!authority.is_password_recovery());
    }

    #[tokio::test]
    async fn test_update_password_requires_session() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        authority.start().await;
        let err = authority.update_password("new-secret").await.unwrap_err();
        assert!(matches!(err, AuthError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_provider_events() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        authority.start().await;
        let (seen, _sub) = recorder(&authority);

        assert!(authority
            .handle_provider_event("USER_DELETED", None)
            .await
            .is_err());
        assert!(authority
            .handle_provider_event("SIGNED_IN", None)
            .await
            .is_err());
        authority
            .handle_provider_event("INITIAL_SESSION", None)
            .await
            .unwrap();
        authority
            .handle_provider_event("SIGNED_IN", Some(session("ada")))
            .await
            .unwrap();
        authority
            .handle_provider_event("TOKEN_REFRESHED", Some(session("ada")))
            .await
            .unwrap();
        authority
            .handle_provider_event("SIGNED_OUT", None)
            .await
            .unwrap();

        let names: Vec<_> = seen.lock().unwrap().iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["started", "signed_in", "token_refreshed", "signed_out"]
        );
    }

    #[tokio::test]
    async fn test_pushed_sessions_are_stored() {
        let provider = Arc::new(FakeProvider::default());
        let authority = SessionAuthority::new(provider.clone());
        authority.start().await;

        let mut refreshed = session("ada");
        refreshed.access_token = "token-ada-2".to_string();

        authority
            .handle_provider_event("SIGNED_IN", Some(session("ada")))
            .await
            .unwrap();
        authority
            .handle_provider_event("TOKEN_REFRESHED", Some(refreshed))
            .await
            .unwrap();
        authority
            .handle_provider_event("PASSWORD_RECOVERY", Some(session("ada")))
            .await
            .unwrap();
        authority
            .handle_provider_event("SIGNED_OUT", None)
            .await
            .unwrap();
        // Rejected pushes store nothing.
        let _ = authority.handle_provider_event("USER_DELETED", None).await;

        let stored = provider.stored.lock().unwrap().clone();
        let first = session("ada").access_token;
        assert_eq!(
            stored,
            vec![
                Some(first.clone()),
                Some("token-ada-2".to_string()),
                Some(first),
                None
            ]
        );
    }

    #[tokio::test]
    async fn test_credential_source() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        authority.start().await;
        assert_eq!(authority.access_token(), None);

        authority.sign_in("ada@example.com", "secret").await.unwrap();
        assert_eq!(authority.access_token().as_deref(), Some("token-ada"));
    }

    #[tokio::test]
    async fn test_snapshot_watch() {
        let authority = SessionAuthority::new(Arc::new(FakeProvider::default()));
        let rx = authority.watch_snapshot();
        assert!(!rx.borrow().started);

        authority.start().await;
        assert!(rx.borrow().started);
        assert_eq!(authority.snapshot(), *rx.borrow());
    }

    #[tokio::test]
    async fn test_offline_provider() {
        let authority = SessionAuthority::new(Arc::new(OfflineAuthProvider));
        assert_eq!(authority.start().await, None);
        let err = authority.sign_in("ada@example.com", "secret").await.unwrap_err();
        assert!(matches!(err, AuthError::Unavailable));
        authority.sign_out().await.unwrap();
    }
}
