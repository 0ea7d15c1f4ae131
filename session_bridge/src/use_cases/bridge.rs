use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::{
    AuthProvider, AuthStateChange, ConnectivityProbe, Notifier, RoleLookup, Routes, Session, User,
};

// Observable auth state handed to the UI layer.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthSnapshot {
    pub session: Option<Session>,
    pub loading: bool,
    // Bumped on every wholesale replacement of `session`.
    revision: u64,
}

impl AuthSnapshot {
    fn new() -> Self {
        Self {
            session: None,
            loading: true,
            revision: 0,
        }
    }

    // The user is always read off the session, never stored on its own.
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|session| &session.user)
    }

    pub(crate) fn replace_session(&mut self, session: Option<Session>) {
        self.session = session;
        self.revision += 1;
    }
}

pub(crate) type SharedState = Arc<watch::Sender<AuthSnapshot>>;

// Holds `loading = true` for as long as it lives.
pub(crate) struct LoadingGuard<'a> {
    state: &'a watch::Sender<AuthSnapshot>,
}

impl<'a> LoadingGuard<'a> {
    pub(crate) fn engage(state: &'a watch::Sender<AuthSnapshot>) -> Self {
        state.send_modify(|snapshot| snapshot.loading = true);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|snapshot| snapshot.loading = false);
    }
}

// Live subscription to the provider's change stream.
struct Subscription {
    active: Arc<AtomicBool>,
    state: SharedState,
    listener: JoinHandle<()>,
}

impl Subscription {
    fn open(events: broadcast::Receiver<AuthStateChange>, state: SharedState) -> Self {
        let active = Arc::new(AtomicBool::new(true));
        let listener = tokio::spawn(listen(events, state.clone(), active.clone()));
        Self {
            active,
            state,
            listener,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Flipped under the state's write lock: the listener reads the flag
        // under the same lock, so no event is applied once this returns.
        self.state.send_if_modified(|_| {
            self.active.store(false, Ordering::Release);
            false
        });
        self.listener.abort();
    }
}

async fn listen(
    mut events: broadcast::Receiver<AuthStateChange>,
    state: SharedState,
    active: Arc<AtomicBool>,
) {
    loop {
        match events.recv().await {
            Ok(change) => {
                if !active.load(Ordering::Acquire) {
                    break;
                }
                info!(
                    event = %change.event,
                    has_session = change.session.is_some(),
                    "auth state changed"
                );
                let applied = state.send_if_modified(|snapshot| {
                    if !active.load(Ordering::Acquire) {
                        return false;
                    }
                    snapshot.replace_session(change.session);
                    snapshot.loading = false;
                    true
                });
                if !applied {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Keep going; the newest retained event still wins.
                warn!(skipped, "auth change listener lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("auth change stream closed");
                break;
            }
        }
    }
}

// Translates the provider's push-based session events into local state and
// exposes the sign-in/sign-out operations on top of it.
pub struct SessionBridge {
    pub(crate) provider: Arc<dyn AuthProvider>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) connectivity: Option<Arc<dyn ConnectivityProbe>>,
    pub(crate) roles: Option<Arc<dyn RoleLookup>>,
    pub(crate) routes: Routes,
    pub(crate) state: SharedState,
    initialized: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl SessionBridge {
    /// Creates the bridge and opens the change subscription.
    ///
    /// Must be called from within a tokio runtime: the subscription listener
    /// runs as a spawned task until [`SessionBridge::shutdown`] or drop.
    pub fn start(provider: Arc<dyn AuthProvider>, notifier: Arc<dyn Notifier>) -> Self {
        let (state_tx, _state_rx) = watch::channel(AuthSnapshot::new());
        let state = Arc::new(state_tx);
        let subscription = Subscription::open(provider.subscribe(), state.clone());
        debug!("auth change subscription opened");

        Self {
            provider,
            notifier,
            connectivity: None,
            roles: None,
            routes: Routes::default(),
            state,
            initialized: AtomicBool::new(false),
            subscription: Mutex::new(Some(subscription)),
        }
    }

    /// Gates sign-in on the given connectivity probe.
    pub fn with_connectivity(mut self, connectivity: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Sends privileged users to the admin destination after sign-in.
    pub fn with_roles(mut self, roles: Arc<dyn RoleLookup>) -> Self {
        self.roles = Some(roles);
        self
    }

    pub fn with_routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    /// Resolves the session the provider already holds, once per bridge.
    ///
    /// Failures are logged and leave the state untouched. `loading` is
    /// cleared however this future ends, including when it is dropped.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            debug!("session bridge already initialized");
            return;
        }

        info!("session bridge initializing");
        let _loading = LoadingGuard::engage(&self.state);
        let started_at = self.state.borrow().revision;

        match self.provider.get_session().await {
            Ok(session) => {
                info!(has_session = session.is_some(), "initial session retrieved");
                self.state.send_if_modified(|snapshot| {
                    // A change event or an explicit operation landed while we
                    // were waiting; its value is newer than ours.
                    if snapshot.revision != started_at {
                        debug!("discarding stale initial session");
                        return false;
                    }
                    snapshot.replace_session(session);
                    true
                });
            }
            Err(err) => {
                error!(error = %err, "failed to get initial session");
            }
        }
    }

    /// Cancels the change subscription. Idempotent.
    pub fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if subscription.is_some() {
            info!("session bridge cleaning up subscription");
        }
        drop(subscription);
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Receiver that observes every snapshot change.
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }
}

impl Drop for SessionBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
