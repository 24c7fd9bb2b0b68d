//! EATMS analytics daemon.
//!
//! Single-binary Tokio application that:
//! 1. Serves cached market price queries against the EATMS backend
//! 2. Evaluates price alerts on a fixed interval
//! 3. Optimizes transport routes with cached results
//! 4. Keeps traffic and weather snapshots fresh in the background

mod config;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use common::clock::SystemClock;
use eatms_client::EatmsRestClient;
use price_analytics::PriceAnalyticsEngine;
use route_optimizer::RouteOptimizationEngine;
use storage::FileStore;

/// EATMS price and transport analytics daemon
#[derive(Parser)]
#[command(name = "eatms-analytics", about = "EATMS price and transport analytics daemon")]
struct Cli {
    /// Run a single alert evaluation cycle and exit.
    #[arg(long)]
    once: bool,

    /// Clear all persisted caches and exit.
    #[arg(long)]
    clear_caches: bool,
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "eatms_analytics=info,eatms_client=info,price_analytics=info,route_optimizer=info,storage=info"
                    .into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("EATMS analytics starting up...");

    // Load configuration.
    let cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    info!("Backend: {}", cfg.api.base_url);
    info!(
        "Price: cache_ttl={}s, alert_interval={}s, history_window={}d",
        cfg.price.cache_ttl_secs, cfg.price.alert_interval_secs, cfg.price.history_window_days,
    );
    info!(
        "Routes: cache_ttl={}s, traffic_refresh={}s, weather_refresh={}s",
        cfg.route.cache_ttl_secs, cfg.route.traffic_refresh_secs, cfg.route.weather_refresh_secs,
    );

    let store = Arc::new(FileStore::new(&cfg.storage.data_dir));
    let clock = Arc::new(SystemClock);

    let client = match EatmsRestClient::new(
        &cfg.api.base_url,
        Duration::from_secs(cfg.api.request_timeout_secs),
        store.clone(),
        &cfg.api.auth_token_key,
    ) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("HTTP client initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    let price_engine = PriceAnalyticsEngine::new(
        client.clone(),
        client.clone(),
        store.clone(),
        clock.clone(),
        cfg.price.clone(),
    )
    .await;

    let route_engine = RouteOptimizationEngine::new(
        client.clone(),
        store.clone(),
        clock.clone(),
        cfg.route.clone(),
    )
    .await;

    // ── Clear-caches mode ────────────────────────────────────────────
    if cli.clear_caches {
        price_engine.clear_cache().await;
        route_engine.clear_cache().await;
        info!("Caches cleared.");
        return;
    }

    // ── Single-cycle mode ────────────────────────────────────────────
    if cli.once {
        info!("Running single alert evaluation cycle...");
        route_engine.refresh_traffic().await;
        route_engine.refresh_weather().await;
        price_engine.run_alert_cycle().await;
        info!(
            "Cycle complete: {} cached price entries, {} traffic snapshots, {} weather snapshots",
            price_engine.cached_entries().await,
            route_engine.latest_traffic().await.len(),
            route_engine.latest_weather().await.len(),
        );
        return;
    }

    // ── Spawn background tasks ───────────────────────────────────────
    info!("Starting background tasks...");

    let mut alert_monitor = price_engine.alert_monitor();
    alert_monitor.start();

    let mut traffic_refresher = route_engine.traffic_refresher();
    traffic_refresher.start();

    let mut weather_refresher = route_engine.weather_refresher();
    weather_refresher.start();

    let hb_prices = price_engine.clone();
    let hb_routes = route_engine.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            info!(
                "HEARTBEAT: price_cache={} traffic={} weather={}",
                hb_prices.cached_entries().await,
                hb_routes.latest_traffic().await.len(),
                hb_routes.latest_weather().await.len(),
            );
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("EATMS analytics is running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
    }

    alert_monitor.stop();
    traffic_refresher.stop();
    weather_refresher.stop();

    info!("EATMS analytics shut down.");
}
