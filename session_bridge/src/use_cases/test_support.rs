use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map;
use tokio::sync::{Notify, broadcast, watch};

use crate::domain::{
    AuthChangeEvent, AuthError, AuthProvider, AuthStateChange, Clock, ConnectivityProbe, Notice,
    Notifier, RoleLookup, Session, User,
};
use crate::use_cases::AuthSnapshot;

pub(crate) fn sample_session(user_id: &str, access_token: &str) -> Session {
    Session {
        access_token: access_token.to_string(),
        refresh_token: format!("refresh-{access_token}"),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Some(1_700_003_600),
        user: User {
            id: user_id.to_string(),
            email: Some(format!("{user_id}@example.com")),
            role: Some("authenticated".to_string()),
            app_metadata: Map::new(),
            user_metadata: Map::new(),
        },
    }
}

// Wait for the bridge state to satisfy `predicate`, failing the test after a second.
pub(crate) async fn wait_until(
    rx: &mut watch::Receiver<AuthSnapshot>,
    predicate: impl FnMut(&AuthSnapshot) -> bool,
) -> AuthSnapshot {
    tokio::time::timeout(Duration::from_secs(1), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for auth state")
        .expect("auth state channel closed")
        .clone()
}

// Scriptable provider double. Events are only pushed through `emit`.
pub(crate) struct FakeProvider {
    current: Mutex<Result<Option<Session>, AuthError>>,
    sign_in_result: Mutex<Result<Session, AuthError>>,
    sign_out_result: Mutex<Result<(), AuthError>>,
    events: broadcast::Sender<AuthStateChange>,
    // Held before answering, so tests can interleave events with in-flight calls.
    session_gate: Option<Arc<Notify>>,
    sign_in_gate: Option<Arc<Notify>>,
    get_session_calls: AtomicUsize,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: Mutex::new(Ok(None)),
            sign_in_result: Mutex::new(Ok(sample_session("user-1", "token-1"))),
            sign_out_result: Mutex::new(Ok(())),
            events,
            session_gate: None,
            sign_in_gate: None,
            get_session_calls: AtomicUsize::new(0),
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_current_session(self, result: Result<Option<Session>, AuthError>) -> Self {
        *self.current.lock().expect("current mutex poisoned") = result;
        self
    }

    pub(crate) fn with_sign_in_result(self, result: Result<Session, AuthError>) -> Self {
        *self.sign_in_result.lock().expect("sign in mutex poisoned") = result;
        self
    }

    pub(crate) fn with_sign_out_result(self, result: Result<(), AuthError>) -> Self {
        *self.sign_out_result.lock().expect("sign out mutex poisoned") = result;
        self
    }

    pub(crate) fn with_session_gate(mut self, gate: Arc<Notify>) -> Self {
        self.session_gate = Some(gate);
        self
    }

    pub(crate) fn with_sign_in_gate(mut self, gate: Arc<Notify>) -> Self {
        self.sign_in_gate = Some(gate);
        self
    }

    pub(crate) fn emit(&self, event: AuthChangeEvent, session: Option<Session>) {
        // No receivers after teardown is fine.
        let _ = self.events.send(AuthStateChange { event, session });
    }

    pub(crate) fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.session_gate {
            gate.notified().await;
        }
        self.current.lock().expect("current mutex poisoned").clone()
    }

    async fn sign_in_with_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<Session, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.sign_in_gate {
            gate.notified().await;
        }
        self.sign_in_result
            .lock()
            .expect("sign in mutex poisoned")
            .clone()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.sign_out_result
            .lock()
            .expect("sign out mutex poisoned")
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}

// Notifier that keeps every notice for later assertions.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices mutex poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .expect("notices mutex poisoned")
            .push(notice);
    }
}

pub(crate) struct FixedRoles(pub(crate) bool);

impl RoleLookup for FixedRoles {
    fn is_admin(&self, _user: &User) -> bool {
        self.0
    }
}

pub(crate) struct FixedConnectivity(pub(crate) bool);

impl ConnectivityProbe for FixedConnectivity {
    fn is_connected(&self) -> bool {
        self.0
    }
}

// Shared fixed time source for deterministic expiry checks.
pub(crate) struct FixedClock(pub(crate) u64);

impl Clock for FixedClock {
    fn now_epoch_seconds(&self) -> u64 {
        self.0
    }
}
