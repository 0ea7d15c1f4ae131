use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::entities::{AuthStateChange, Notice, Session, User};
use crate::domain::errors::AuthError;

// The bridge depends on these traits, not on the concrete provider client.
// Dependencies point inwards to the domain layer.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    // Current session, if any. Safe to call repeatedly.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    // Long-lived change stream. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthStateChange>;
}

// Cached connectivity answer; the probe itself runs elsewhere.
pub trait ConnectivityProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

// Role lookup used to pick the post sign-in destination.
pub trait RoleLookup: Send + Sync {
    fn is_admin(&self, user: &User) -> bool;
}

// Sink for user-facing notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

// One round trip against the backend to see whether it is reachable.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Result<(), AuthError>;
}

// Port for persisting the provider session between runs.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Session>, String>;
    async fn save(&self, key: &str, session: &Session) -> Result<(), String>;
    async fn remove(&self, key: &str) -> Result<bool, String>;
}

// Port for retrieving the current time.
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> u64;
}
