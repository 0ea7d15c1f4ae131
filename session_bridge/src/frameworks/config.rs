use std::path::{Path, PathBuf};
use std::{env, fmt, time::Duration};
use url::Url;

use crate::domain::Routes;
use crate::interface_adapters::clients::ProviderSettings;

// Runtime configuration, read from the environment (and `.env`).

pub const EVENT_CHANNEL_CAPACITY: usize = 64;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
const DEFAULT_STORAGE_KEY: &str = "session-bridge-auth";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;
const DEFAULT_HEALTH_PATH: &str = "rest/v1/";
const DEFAULT_ADMIN_ROLE: &str = "admin";
const DEFAULT_ROUTES_FILE: &str = "routes.toml";

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    InvalidUrl { key: &'static str, reason: String },
    Routes { path: PathBuf, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing environment variable {key}"),
            ConfigError::InvalidUrl { key, reason } => write!(f, "{key} is not a valid url: {reason}"),
            ConfigError::Routes { path, reason } => {
                write!(f, "invalid routes file {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// Credentials the runner signs in with at startup, when both are set.
#[derive(Clone)]
pub struct StartupCredentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for StartupCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub provider: ProviderSettings,
    pub storage_dir: Option<PathBuf>,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub admin_role: String,
    pub routes_file: PathBuf,
    pub credentials: Option<StartupCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Build the config from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let raw_url = get("AUTH_PROVIDER_URL").ok_or(ConfigError::Missing("AUTH_PROVIDER_URL"))?;
        let base_url = Url::parse(&raw_url).map_err(|err| ConfigError::InvalidUrl {
            key: "AUTH_PROVIDER_URL",
            reason: err.to_string(),
        })?;
        let anon_key = get("AUTH_ANON_KEY").ok_or(ConfigError::Missing("AUTH_ANON_KEY"))?;

        let number = |key: &str, default: u64| {
            get(key)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str, default: bool| match get(key).as_deref() {
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            _ => default,
        };

        let provider = ProviderSettings {
            base_url,
            anon_key,
            request_timeout: Duration::from_millis(number(
                "AUTH_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )),
            storage_key: get("AUTH_STORAGE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string()),
            refresh_margin: Duration::from_secs(number(
                "AUTH_REFRESH_MARGIN_SECS",
                DEFAULT_REFRESH_MARGIN_SECS,
            )),
            health_path: get("AUTH_HEALTH_PATH").unwrap_or_else(|| DEFAULT_HEALTH_PATH.to_string()),
            event_capacity: EVENT_CHANNEL_CAPACITY,
        };

        let credentials = match (get("AUTH_EMAIL"), get("AUTH_PASSWORD")) {
            (Some(email), Some(password)) => Some(StartupCredentials { email, password }),
            _ => None,
        };

        Ok(Self {
            provider,
            storage_dir: get("AUTH_STORAGE_DIR").map(PathBuf::from),
            auto_refresh: flag("AUTH_AUTO_REFRESH", true),
            refresh_interval: Duration::from_secs(
                number("AUTH_REFRESH_INTERVAL_SECS", DEFAULT_REFRESH_INTERVAL_SECS).max(1),
            ),
            admin_role: get("AUTH_ADMIN_ROLE").unwrap_or_else(|| DEFAULT_ADMIN_ROLE.to_string()),
            routes_file: get("AUTH_ROUTES_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROUTES_FILE)),
            credentials,
        })
    }
}

// Load the route table. A missing file means the default routes.
pub fn load_routes(path: &Path) -> Result<Routes, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Routes::default()),
        Err(err) => {
            return Err(ConfigError::Routes {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    };

    toml::from_str(&raw).map_err(|err| ConfigError::Routes {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
