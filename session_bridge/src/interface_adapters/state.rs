use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::Clock;
use crate::interface_adapters::clients::ProviderClient;
use crate::interface_adapters::health::HealthMonitor;
use crate::use_cases::SessionBridge;

// Everything the runtime wires together at startup.
pub struct AppState {
    pub provider: Arc<ProviderClient>,
    pub health: Arc<HealthMonitor>,
    pub bridge: SessionBridge,
}

// System clock adapter used for session expiry checks.
#[derive(Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
