use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// The serialization within this layer is a dependency leak, but the provider's
// token payload maps onto these records one to one, so we keep it pragmatic.

// Identity record embedded in every session issued by the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    // Provider-managed attributes (roles, provider list); not user editable.
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    // Profile attributes supplied by the user at sign-up.
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

// Credential bundle issued by the provider. The bridge only ever holds a
// read-only copy and replaces it wholesale.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: u64,
    // Absolute expiry in epoch seconds. Older provider versions omit it.
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    // True when the session expires within `margin_seconds` of `now`.
    pub fn expires_within(&self, now: u64, margin_seconds: u64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now.saturating_add(margin_seconds),
            None => false,
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

// Kinds of session transitions pushed by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl fmt::Display for AuthChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthChangeEvent::InitialSession => "INITIAL_SESSION",
            AuthChangeEvent::SignedIn => "SIGNED_IN",
            AuthChangeEvent::SignedOut => "SIGNED_OUT",
            AuthChangeEvent::TokenRefreshed => "TOKEN_REFRESHED",
        };
        f.write_str(name)
    }
}

// One notification from the provider's change stream.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthStateChange {
    pub event: AuthChangeEvent,
    pub session: Option<Session>,
}

// Navigation intent returned to the UI layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Home,
    Admin,
    Login,
}

// Route table used to turn a destination into a path.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub home: String,
    pub admin: String,
    pub login: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            home: "/".to_string(),
            admin: "/admin".to_string(),
            login: "/login".to_string(),
        }
    }
}

impl Routes {
    pub fn path_for(&self, destination: Destination) -> &str {
        match destination {
            Destination::Home => &self.home,
            Destination::Admin => &self.admin,
            Destination::Login => &self.login,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

// User-facing notification (rendered as a toast by the UI).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
