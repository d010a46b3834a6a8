//! # prastha
//!
//! The entry point that assembles the server from settings: store backend,
//! fan-out hub, services, the expiry sweep and the HTTP/WebSocket surface.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState, MeteredPublisher, Metrics};
use chrono::Duration;
use configs::{LogFormat, Settings, StorageBackend};
use domains::{Clock, EventPublisher};
use services::{
    BroadcastPublisher, ContentLimits, ExpiryPolicy, Ports, RetryPolicy, Services, SystemClock,
};
use storage_adapters::InMemoryStore;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(settings.log.format);

    let hub = BroadcastPublisher::new(settings.fanout.channel_capacity);
    let metrics = Metrics::new();
    let events: Arc<dyn EventPublisher> =
        Arc::new(MeteredPublisher::new(hub.clone(), metrics.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ports = open_store(&settings, clock, events)
        .await?
        .with_retry(RetryPolicy {
            read_retries: settings.limits.read_retries,
            ..RetryPolicy::default()
        })
        .with_limits(content_limits(&settings));
    let services = Services::new(ports, expiry_policy(&settings));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = services
        .expiry
        .clone()
        .spawn(settings.expiry.sweep_interval(), shutdown_rx);

    let app = router(AppState::new(services, hub, metrics));
    let listener = tokio::net::TcpListener::bind(&settings.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_addr))?;
    tracing::info!(
        addr = %settings.server.bind_addr,
        backend = ?settings.storage.backend,
        "prastha listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(err) = sweeper.await {
        tracing::warn!(error = %err, "expiry sweep task ended abnormally");
    }
    tracing::info!("prastha stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_store(
    settings: &Settings,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventPublisher>,
) -> anyhow::Result<Ports> {
    match settings.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            Ok(Ports::new(Arc::new(InMemoryStore::new()), clock, events))
        }
        #[cfg(feature = "db-sqlite")]
        StorageBackend::Sqlite => {
            use secrecy::ExposeSecret;
            let store = storage_adapters::SqliteStore::new(settings.storage.database_url.expose_secret())
                .await
                .context("failed to open sqlite store")?;
            Ok(Ports::new(Arc::new(store), clock, events))
        }
        #[cfg(not(feature = "db-sqlite"))]
        StorageBackend::Sqlite => {
            anyhow::bail!("storage.backend = \"sqlite\" requires the db-sqlite feature")
        }
    }
}

fn content_limits(settings: &Settings) -> ContentLimits {
    ContentLimits {
        max_message_len: settings.limits.max_message_len,
        max_gossip_len: settings.limits.max_gossip_len,
        max_comment_len: settings.limits.max_comment_len,
        max_thread_duration: Duration::hours(settings.threads.max_duration_hours),
        max_gossip_duration: Duration::hours(settings.gossips.max_duration_hours),
        max_reply_depth: settings.limits.max_reply_depth,
        ..ContentLimits::default()
    }
}

fn expiry_policy(settings: &Settings) -> ExpiryPolicy {
    ExpiryPolicy {
        urgent_within: Duration::minutes(settings.expiry.urgent_within_mins),
        soon_within: Duration::minutes(settings.expiry.soon_within_mins),
        expired_alert_window: Duration::minutes(settings.expiry.expired_alert_window_mins),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
