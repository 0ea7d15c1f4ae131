// Framework bootstrap for the headless session runner.

use crate::domain::SessionStorage;
use crate::frameworks::config::{self, Config};
use crate::interface_adapters::clients::ProviderClient;
use crate::interface_adapters::health::HealthMonitor;
use crate::interface_adapters::notify::TracingNotifier;
use crate::interface_adapters::roles::MetadataRoleLookup;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::storage::{FileSessionStorage, InMemorySessionStorage};
use crate::use_cases::{AuthSnapshot, SessionBridge};

use std::io::Result;
use std::sync::Arc;
use tokio::sync::watch;

fn init_runtime() {
    // Load .env locally; safe to ignore when not present.
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run() -> Result<()> {
    init_runtime();

    let config = Config::from_env()
        .inspect_err(|e| {
            tracing::error!(error = %e, "missing or invalid auth configuration");
        })
        .map_err(std::io::Error::other)?;

    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> Result<()> {
    let state = build_state(&config)?;

    // Probe the backend once up front; the bridge gates sign-in on the answer.
    state.health.health_check().await;

    let refresher = config
        .auto_refresh
        .then(|| state.provider.clone().spawn_auto_refresh(config.refresh_interval));

    let observer = tokio::spawn(log_transitions(state.bridge.watch()));

    state.bridge.initialize().await;

    let mut signed_in_here = false;
    if let Some(credentials) = &config.credentials {
        match state
            .bridge
            .sign_in(&credentials.email, &credentials.password)
            .await
        {
            Ok(destination) => {
                signed_in_here = true;
                let path = state.bridge.routes().path_for(destination);
                tracing::info!(?destination, %path, "navigate");
            }
            Err(err) => {
                tracing::warn!(error = %err, "startup sign in failed");
            }
        }
    }

    tracing::info!("session bridge running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    if signed_in_here {
        let destination = state.bridge.sign_out().await;
        let path = state.bridge.routes().path_for(destination);
        tracing::info!(?destination, %path, "navigate");
    }

    state.bridge.shutdown();
    observer.abort();
    if let Some(refresher) = refresher {
        refresher.abort();
    }
    Ok(())
}

fn build_state(config: &Config) -> Result<AppState> {
    let storage: Arc<dyn SessionStorage> = match &config.storage_dir {
        Some(dir) => {
            tracing::debug!(storage_dir = %dir.display(), "persisting sessions to disk");
            Arc::new(FileSessionStorage::new(dir))
        }
        None => Arc::new(InMemorySessionStorage::default()),
    };

    let provider = ProviderClient::new(config.provider.clone(), storage)
        .map_err(|e| std::io::Error::other(format!("failed to initialize auth client: {e}")))?;
    let provider = Arc::new(provider);
    tracing::debug!(
        auth_base_url = %config.provider.base_url,
        auth_request_timeout_ms = config.provider.request_timeout.as_millis(),
        "auth client configured"
    );

    let routes = config::load_routes(&config.routes_file).map_err(std::io::Error::other)?;
    let health = Arc::new(HealthMonitor::new(provider.clone()));

    let bridge = SessionBridge::start(provider.clone(), Arc::new(TracingNotifier))
        .with_connectivity(health.clone())
        .with_roles(Arc::new(MetadataRoleLookup::new(config.admin_role.clone())))
        .with_routes(routes);

    Ok(AppState {
        provider,
        health,
        bridge,
    })
}

async fn log_transitions(mut rx: watch::Receiver<AuthSnapshot>) {
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        tracing::info!(
            user_id = snapshot.user().map(|user| user.id.as_str()),
            email = snapshot.user().and_then(|user| user.email.as_deref()),
            loading = snapshot.loading,
            "auth snapshot"
        );
    }
}
