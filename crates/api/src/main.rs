use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use academy_api::background;
use academy_api::config::{SchedulerConfig, ServerConfig};
use academy_api::router::build_app_router;
use academy_api::state::AppState;
use academy_core::policy::PolicyConfig;
use academy_db::{MemoryStore, PgStore, Store};
use academy_events::{
    EmailConfig, EmailDelivery, EventBus, LogSink, NotificationRouter, StaticDirectory,
    UserDirectory,
};
use academy_lifecycle::{Academy, Context};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(error) = run().await {
        tracing::error!("Server failed: {error:#}");
        std::process::exit(1);
    }
}

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "academy_api=debug,academy_lifecycle=debug,academy_events=info,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let scheduler = SchedulerConfig::from_env().context("invalid scheduler configuration")?;
    let policy = PolicyConfig::from_env();
    tracing::info!(host = %config.host, port = config.port, ?policy, "Loaded configuration");

    // --- Store ---
    let store: Arc<dyn Store> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = academy_db::create_pool(&database_url)
                .await
                .context("failed to connect to database")?;
            academy_db::health_check(&pool)
                .await
                .context("database health check failed")?;
            academy_db::run_migrations(&pool)
                .await
                .context("failed to run database migrations")?;
            tracing::info!("Database ready, migrations applied");
            Arc::new(PgStore::new(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    // --- Staff directory ---
    let directory: Arc<dyn UserDirectory> = match std::env::var("USER_DIRECTORY") {
        Ok(raw) => Arc::new(StaticDirectory::from_json(&raw).context("USER_DIRECTORY is not valid JSON")?),
        Err(_) => {
            tracing::warn!("USER_DIRECTORY not set, mentions and role notices resolve to nobody");
            Arc::new(StaticDirectory::default())
        }
    };

    // --- Event bus and notifications ---
    let event_bus = Arc::new(EventBus::default());
    let mut notification_router = NotificationRouter::new(Arc::new(LogSink), Arc::clone(&directory));
    match EmailConfig::from_env() {
        Some(email) => {
            tracing::info!(smtp_host = %email.smtp_host, "Email delivery enabled");
            notification_router = notification_router.with_email(EmailDelivery::new(email));
        }
        None => tracing::info!("SMTP_HOST not set, email delivery disabled"),
    }
    let router_handle = tokio::spawn(notification_router.run(event_bus.subscribe()));

    // --- Lifecycle services ---
    let ctx = Context::new(store, Arc::clone(&event_bus))
        .with_directory(directory)
        .with_policy(policy);
    let academy = Academy::new(ctx);

    // --- Sweeps ---
    let sweep_cancel = tokio_util::sync::CancellationToken::new();
    let sweep_handle = tokio::spawn(background::sweeps::run(
        academy.clone(),
        scheduler,
        sweep_cancel.clone(),
    ));

    // --- Server ---
    let state = AppState {
        academy,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().context("HOST is not a valid IP address")?,
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    sweep_cancel.cancel();
    if tokio::time::timeout(grace, sweep_handle).await.is_err() {
        tracing::warn!("Sweep scheduler did not stop in time");
    }

    // The router exits once every sender is gone.
    drop(event_bus);
    if tokio::time::timeout(grace, router_handle).await.is_err() {
        tracing::warn!("Notification router did not drain in time");
    }

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
