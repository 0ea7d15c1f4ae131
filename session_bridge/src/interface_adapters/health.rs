use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{ConnectivityProbe, HealthCheck};

// Runs the backend probe on request and caches the answer for the
// connectivity gate. Reports connected until a check says otherwise.
pub struct HealthMonitor {
    probe: Arc<dyn HealthCheck>,
    connected: AtomicBool,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthCheck>) -> Self {
        Self {
            probe,
            connected: AtomicBool::new(true),
        }
    }

    pub async fn health_check(&self) -> bool {
        let connected = match self.probe.check().await {
            Ok(()) => {
                tracing::info!("successfully connected to auth backend");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "error connecting to auth backend");
                false
            }
        };
        self.connected.store(connected, Ordering::Release);
        connected
    }
}

impl ConnectivityProbe for HealthMonitor {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
