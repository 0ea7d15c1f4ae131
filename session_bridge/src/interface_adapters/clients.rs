use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use url::Url;

use crate::domain::{
    AuthChangeEvent, AuthError, AuthProvider, AuthStateChange, Clock, HealthCheck, Session,
    SessionStorage,
};
use crate::interface_adapters::protocol::{
    PasswordGrantRequest, ProviderErrorResponse, RefreshGrantRequest,
};
use crate::interface_adapters::state::SystemClock;

// Connection and behavior settings for the provider client.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
    pub base_url: Url,
    pub anon_key: String,
    pub request_timeout: Duration,
    pub storage_key: String,
    // Sessions this close to expiry are refreshed before being handed out.
    pub refresh_margin: Duration,
    pub health_path: String,
    pub event_capacity: usize,
}

// Thin wrapper around reqwest for the provider's auth REST API. Holds the
// current session, persists it and broadcasts every transition.
pub struct ProviderClient {
    http: Client,
    base_url: Url,
    anon_key: String,
    storage_key: String,
    refresh_margin_seconds: u64,
    health_path: String,
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<Session>>,
    // Held across every grant, refresh and sign-out so their outcomes apply
    // in call order.
    ops: Mutex<()>,
    events: broadcast::Sender<AuthStateChange>,
}

impl ProviderClient {
    pub fn new(
        settings: ProviderSettings,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(settings.request_timeout).build()?;
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));

        // `Url::join` drops the last segment unless the base ends with '/'.
        let mut base_url = settings.base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            anon_key: settings.anon_key,
            storage_key: settings.storage_key,
            refresh_margin_seconds: settings.refresh_margin.as_secs(),
            health_path: settings.health_path,
            storage,
            clock: Arc::new(SystemClock),
            current: Mutex::new(None),
            ops: Mutex::new(()),
            events,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|err| AuthError::Other(format!("invalid endpoint {path}: {err}")))
    }

    fn token_endpoint(&self, grant_type: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    /// Exchanges the current refresh token for a new session.
    ///
    /// Returns `Ok(None)` when there is nothing to refresh. A refresh token
    /// the provider rejects ends the session and emits `SIGNED_OUT`.
    pub async fn refresh_session(&self) -> Result<Option<Session>, AuthError> {
        let _op = self.ops.lock().await;
        self.refresh_locked().await
    }

    // Caller holds `ops`.
    async fn refresh_locked(&self) -> Result<Option<Session>, AuthError> {
        let Some(refresh_token) = self
            .current
            .lock()
            .await
            .as_ref()
            .map(|session| session.refresh_token.clone())
        else {
            return Ok(None);
        };

        let url = self.token_endpoint("refresh_token")?;
        match self
            .grant(url, &RefreshGrantRequest {
                refresh_token: &refresh_token,
            })
            .await
        {
            Ok(session) => {
                tracing::info!(user_id = %session.user.id, "session refreshed");
                self.set_session(Some(session.clone()), AuthChangeEvent::TokenRefreshed)
                    .await;
                Ok(Some(session))
            }
            Err(err @ AuthError::InvalidCredentials(_)) => {
                tracing::warn!(error = %err, "refresh token rejected; ending session");
                self.set_session(None, AuthChangeEvent::SignedOut).await;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Periodically refreshes the session before it expires.
    pub fn spawn_auto_refresh(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !self.needs_refresh().await {
                    continue;
                }
                if let Err(err) = self.refresh_session().await {
                    tracing::warn!(error = %err, "background session refresh failed");
                }
            }
        })
    }

    async fn needs_refresh(&self) -> bool {
        let now = self.clock.now_epoch_seconds();
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|session| session.expires_within(now, self.refresh_margin_seconds))
    }

    // Replace the cached session, persist it best-effort and announce it.
    async fn set_session(&self, session: Option<Session>, event: AuthChangeEvent) {
        match &session {
            Some(session) => {
                if let Err(err) = self.storage.save(&self.storage_key, session).await {
                    tracing::warn!(error = %err, "failed to persist session");
                }
            }
            None => {
                if let Err(err) = self.storage.remove(&self.storage_key).await {
                    tracing::warn!(error = %err, "failed to remove persisted session");
                }
            }
        }

        *self.current.lock().await = session.clone();
        self.announce(event, session);
    }

    fn announce(&self, event: AuthChangeEvent, session: Option<Session>) {
        // Nobody listening is not an error.
        let _ = self.events.send(AuthStateChange { event, session });
    }

    async fn grant<B: serde::Serialize + Sync>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<Session, AuthError> {
        let res = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = res.status();

        if !status.is_success() {
            let payload = res
                .json::<ProviderErrorResponse>()
                .await
                .unwrap_or_default();
            return Err(classify_failure(status, &payload));
        }

        let mut session = res
            .json::<Session>()
            .await
            .map_err(|err| AuthError::Other(format!("token response decode error: {err}")))?;
        stamp_expiry(&mut session, self.clock.now_epoch_seconds());
        Ok(session)
    }
}

// Providers that omit `expires_at` only send the lifetime.
fn stamp_expiry(session: &mut Session, now: u64) {
    if session.expires_at.is_none() {
        session.expires_at = Some(now.saturating_add(session.expires_in));
    }
}

#[async_trait]
impl AuthProvider for ProviderClient {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let _op = self.ops.lock().await;
        let cached = self.current.lock().await.clone();
        let (session, restored) = match cached {
            Some(session) => (session, false),
            None => {
                let restored = self
                    .storage
                    .load(&self.storage_key)
                    .await
                    .map_err(AuthError::Other)?;
                let Some(session) = restored else {
                    return Ok(None);
                };
                tracing::debug!(user_id = %session.user.id, "restored persisted session");
                *self.current.lock().await = Some(session.clone());
                (session, true)
            }
        };

        let now = self.clock.now_epoch_seconds();
        if session.expires_within(now, self.refresh_margin_seconds) {
            match self.refresh_locked().await {
                // An unreachable provider does not end a session that is
                // still valid; the next refresh gets another chance.
                Err(err) if err.is_network() && !session.expires_within(now, 0) => {
                    tracing::warn!(error = %err, "refresh failed; keeping unexpired session");
                }
                result => return result,
            }
        }

        if restored {
            self.announce(AuthChangeEvent::InitialSession, Some(session.clone()));
        }
        Ok(Some(session))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let _op = self.ops.lock().await;
        let url = self.token_endpoint("password")?;
        let session = self
            .grant(url, &PasswordGrantRequest { email, password })
            .await?;

        self.set_session(Some(session.clone()), AuthChangeEvent::SignedIn)
            .await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let _op = self.ops.lock().await;
        let access_token = self
            .current
            .lock()
            .await
            .as_ref()
            .map(|session| session.access_token.clone());

        let remote = match access_token {
            Some(token) => self.revoke(&token).await,
            None => Ok(()),
        };

        // The local session goes away whatever the provider said.
        self.set_session(None, AuthChangeEvent::SignedOut).await;
        remote
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }
}

impl ProviderClient {
    async fn revoke(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.endpoint("auth/v1/logout")?;
        let res = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = res.status();

        // 401/404 mean the session is already gone on the provider side.
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND
        {
            return Ok(());
        }

        let payload = res
            .json::<ProviderErrorResponse>()
            .await
            .unwrap_or_default();
        Err(classify_failure(status, &payload))
    }
}

#[async_trait]
impl HealthCheck for ProviderClient {
    async fn check(&self) -> Result<(), AuthError> {
        let url = self.endpoint(&self.health_path)?;
        let res = self
            .http
            .head(url)
            .header("apikey", &self.anon_key)
            .send()
            .await
            .map_err(classify_transport)?;

        // Any answer below 500 proves the backend is reachable.
        if res.status().is_server_error() {
            return Err(AuthError::Network(format!(
                "health check returned {}",
                res.status()
            )));
        }
        Ok(())
    }
}

fn classify_transport(err: reqwest::Error) -> AuthError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        AuthError::Network(err.to_string())
    } else {
        AuthError::Other(format!("auth transport error: {err}"))
    }
}

// Map a non-success provider response onto the domain taxonomy.
pub(crate) fn classify_failure(status: StatusCode, payload: &ProviderErrorResponse) -> AuthError {
    let message = payload
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("auth upstream error {status}"));

    if matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    ) {
        return AuthError::Network(message);
    }

    let credentials_code = matches!(
        payload.code(),
        Some("invalid_grant" | "invalid_credentials" | "refresh_token_not_found")
    );
    let credentials_status = matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY
    );
    if status == StatusCode::UNAUTHORIZED || (credentials_status && credentials_code) {
        return AuthError::InvalidCredentials(message);
    }

    AuthError::Other(message)
}
