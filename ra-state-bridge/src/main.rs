//! ra-state bridge binary: load config, connect, poll until Ctrl+C.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ra_state_bridge::{
    broker, liveness, load_config, FeedBridge, HttpFetcher, Presence, Topics,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // no .env is fine

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ra_state_bridge=info")),
        )
        .init();

    info!("ra-state bridge v{} starting", env!("CARGO_PKG_VERSION"));

    let cfg = load_config().await.context("Failed to load configuration")?;
    let topics = Topics::new(&cfg.topics.base, &cfg.feed.site);
    let url = cfg.feed.url()?;
    let fetcher = HttpFetcher::new(&url, cfg.feed.timeout())
        .context("Failed to build HTTP client")?;
    info!(site = %cfg.feed.site, url = %url, "Feed source configured");

    let (publisher, eventloop) = broker::connect(&cfg.mqtt, &topics);
    let events = broker::spawn_event_loop(eventloop, publisher.clone(), topics.clone());

    let bridge = FeedBridge::new(fetcher, publisher.clone(), topics.clone(), cfg.poll.clone());

    let discovery = cfg.discovery.enabled.then_some(&cfg.discovery);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };
    let outcome = bridge
        .run_until(discovery, shutdown)
        .await
        .context("Bridge stopped");

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }

    // A clean disconnect discards the last-will, so say offline ourselves.
    // Bounded: with the broker unreachable the request queue may be full.
    let farewell = async {
        if let Err(e) = liveness::announce(&publisher, &topics, Presence::Offline).await {
            warn!("Failed to announce offline: {}", e);
        }
        if let Err(e) = publisher.disconnect().await {
            warn!("Failed to disconnect: {}", e);
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, farewell).await.is_err() {
        warn!("Broker unreachable, exiting without offline announcement");
    }
    // Give the event loop a moment to flush the offline message.
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, events).await;

    outcome
}
