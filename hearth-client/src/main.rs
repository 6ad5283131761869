//! # Hearth Client
//!
//! Headless client that signs in, watches one house and keeps its cached
//! lists fresh from realtime events, falling back to polling when the
//! socket is down.
//!
//! ## Usage
//!
//! ```bash
//! HEARTH_API_URL=http://localhost:8080 \
//! HEARTH_TOKEN=... \
//! cargo run -p hearth-client
//! ```

use anyhow::Context;
use hearth_client::{
    api::ApiClient,
    cache::QueryCache,
    config::ClientConfig,
    poller::FallbackPoller,
    query::QueryKey,
    realtime::RealtimeListener,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "hearth_client=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Hearth Client v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env().context("Invalid configuration")?;
    let api = Arc::new(ApiClient::new(&config.api_url, &config.token)?);

    let session = api.create_session().await.context("Sign-in failed")?;
    let viewer = session.user.id;
    let house = config
        .house_id
        .or_else(|| session.primary_house().map(|house| house.id));

    tracing::info!(user_id = %viewer, email = %session.user.email, houses = session.houses.len(), "Signed in");

    let cache = QueryCache::new(api);

    let mut keys = vec![QueryKey::Houses(viewer), QueryKey::Notifications(viewer)];
    match house {
        Some(house) => keys.extend(QueryKey::house_queries(house)),
        None => tracing::info!("Not a member of any house yet"),
    }

    let _watches: Vec<_> = keys.iter().map(|key| cache.observe(*key)).collect();
    for key in &keys {
        if let Err(e) = cache.get(*key).await {
            tracing::warn!(query = %key, error = %e, "Initial load failed");
        }
    }

    let shutdown = CancellationToken::new();

    let listener = RealtimeListener::new(config.realtime_url(), config.token.clone(), cache.clone());
    let poller = FallbackPoller::new(cache.clone(), config.poll_interval, listener.status());

    let listener = tokio::spawn(listener.run(shutdown.clone()));
    let poller = tokio::spawn(poller.run(shutdown.clone()));

    tracing::info!("Client ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, exiting...");

    shutdown.cancel();
    let _ = tokio::join!(listener, poller);

    Ok(())
}
