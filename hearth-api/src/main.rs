//! # Hearth API Server
//!
//! REST and realtime server for households: houses, members, invitations,
//! tasks, shopping lists, devices and notifications.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/hearth \
//! AUTH_JWT_SECRET=... \
//! cargo run -p hearth-api
//! ```
//!
//! Set `LOG_FORMAT=json` for structured logs and `REDIS_URL` to fan realtime
//! events out across several instances.

use anyhow::Context;
use hearth_api::{
    app::{build_router, AppState},
    config::Config,
};
use hearth_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use hearth_shared::redis::{sanitize_url, RedisClient, RedisConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "hearth_api=debug,hearth_shared=debug,tower_http=debug";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Hearth API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Invalid configuration")?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::from_url(&config.database.url)
    })
    .await
    .context("Failed to connect to the database")?;

    run_migrations(&pool).await.context("Failed to run migrations")?;

    let redis = match &config.realtime.redis_url {
        Some(url) => {
            let client = RedisClient::new(RedisConfig::from_url(url))
                .await
                .with_context(|| format!("Failed to connect to Redis at {}", sanitize_url(url)))?;
            Some(client)
        }
        None => {
            tracing::info!("REDIS_URL not set, realtime events stay on this instance");
            None
        }
    };

    let bind_address = config.bind_address();
    let state = AppState::new(pool.clone(), config, redis);

    let shutdown = CancellationToken::new();
    let subscriber = state
        .relay
        .clone()
        .map(|relay| tokio::spawn(relay.run_subscriber(shutdown.clone())));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = subscriber {
        let _ = handle.await;
    }
    close_pool(pool).await;

    tracing::info!("Server stopped");
    Ok(())
}
