//! # Readiness Gate
//!
//! Combines "database ready" and "auth state known" into the single signal
//! the UI waits on before leaving its loading state.
//!
//! ```text
//!   LocalStore settles ──► mark_db_ready()   ─┐
//!                                             ├──► is_ready() ──► UI interactive
//!   first Started event ──► mark_auth_known() ┘      (flips true once, stays true)
//! ```
//!
//! Under LocalOnly the gate is built with `require_auth = false` and only
//! waits on the store.

use stride_core::ReadinessSnapshot;
use tokio::sync::watch;
use tracing::info;

/// Monotonic readiness signal.
#[derive(Debug)]
pub struct ReadinessGate {
    require_auth: bool,
    tx: watch::Sender<ReadinessSnapshot>,
}

impl ReadinessGate {
    /// Creates a gate with both flags false.
    pub fn new(require_auth: bool) -> Self {
        let (tx, _) = watch::channel(ReadinessSnapshot::default());
        ReadinessGate { require_auth, tx }
    }

    /// Records that local store initialization has settled.
    pub fn mark_db_ready(&self) {
        self.update(|s| &mut s.db_ready);
    }

    /// Records that the first `Started` event was observed.
    pub fn mark_auth_known(&self) {
        self.update(|s| &mut s.auth_known);
    }

    fn update(&self, flag: impl Fn(&mut ReadinessSnapshot) -> &mut bool) {
        let require_auth = self.require_auth;
        let mut flipped = false;
        self.tx.send_if_modified(|snapshot| {
            let was_ready = snapshot.is_ready(require_auth);
            let slot = flag(snapshot);
            if *slot {
                return false;
            }
            *slot = true;
            flipped = !was_ready && snapshot.is_ready(require_auth);
            true
        });
        if flipped {
            info!("Readiness gate open");
        }
    }

    /// Whether auth must be known before the gate opens.
    pub fn requires_auth(&self) -> bool {
        self.require_auth
    }

    /// Current flags.
    pub fn snapshot(&self) -> ReadinessSnapshot {
        *self.tx.borrow()
    }

    /// Returns true once the gate has opened.
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ready(self.require_auth)
    }

    /// Subscribes to flag changes.
    pub fn subscribe(&self) -> watch::Receiver<ReadinessSnapshot> {
        self.tx.subscribe()
    }

    /// Resolves once the gate is open; immediately if it already is.
    pub async fn wait_until_ready(&self) {
        let require_auth = self.require_auth;
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|s| s.is_ready(require_auth)).await;
    }
}
