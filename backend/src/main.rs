use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use backend::{
    config::AppConfig,
    history::{HistoryClient, points_from_swaps},
    logger::init_tracing,
};
use engine::series::PriceSeries;
use market::{feed::ws::LogWsClient, time::now_ms, watcher::PoolWatcher};

/// Fetch historical observations and seed the watcher.
///
/// Failure is logged and ignored: the live feed starts over whatever
/// buffer state exists.
async fn seed_from_history(watcher: &Arc<PoolWatcher<LogWsClient>>, cfg: &AppConfig) {
    let client =
        match HistoryClient::new(cfg.history_base_url.clone(), cfg.history_api_key.clone()) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = ?e, "history client unavailable; starting unseeded");
                return;
            }
        };

    let from_secs = (now_ms() / 1000).saturating_sub(cfg.backfill_lookback_secs);

    match client.fetch_swaps(from_secs).await {
        Ok(swaps) => {
            let points = points_from_swaps(&swaps, &cfg.pair());
            watcher.seed(points).await;
        }
        Err(e) => {
            warn!(error = ?e, "backfill failed; starting with an empty series");
        }
    }
}

/// Starts the maintenance loop (fixed cadence): evicts stale points, fills
/// cadence gaps, and reports counters, independent of message arrival.
fn start_maintenance_loop(watcher: Arc<PoolWatcher<LogWsClient>>, cfg: &AppConfig) {
    let tick = Duration::from_millis(cfg.maintenance_tick_ms);
    let cadence_ms = cfg.gap_fill_cadence_ms;

    tokio::spawn(async move {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            watcher.run_maintenance(now_ms(), cadence_ms).await;
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    info!("starting pool price watcher...");

    let cfg = AppConfig::from_env();

    let series = PriceSeries::new(cfg.series_bound(), cfg.coalesce_ms);
    let feed = Arc::new(LogWsClient::new(cfg.feed_ws_url.clone()));
    let watcher = PoolWatcher::new(cfg.pool(), feed, series);

    // Seed strictly before the live stream starts so the backfill can
    // never race live appends.
    seed_from_history(&watcher, &cfg).await;

    Arc::clone(&watcher).start();
    start_maintenance_loop(Arc::clone(&watcher), &cfg);

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    watcher.stop().await;

    Ok(())
}
