//! PoolWatcher
//!
//! Owns the live side of the price series for a single pool:
//!   • spawns the WebSocket subscription stream
//!   • decodes pushed logs into swap events
//!   • maintains the bounded price series and the current-price cell
//!   • tracks the connection state for the presentation layer
//!
//! PoolWatcher is an Arc-managed async service, so long-lived tasks may
//! safely capture `self` without lifetime issues. It is the only live
//! writer to the series; the one-shot backfill seed runs before `start()`.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use rust_decimal::Decimal;
use tokio::sync::{
    Mutex,
    mpsc::{self, Receiver},
    watch,
};
use tracing::{Instrument, debug, error, info, instrument, warn};

use engine::series::{PricePoint, PriceSeries};

use crate::decode::{DecodeError, SWAP_EVENT_SIGNATURE, decode_swap};
use crate::feed::{FeedApi, LogSubscription};
use crate::metrics::Counters;
use crate::time::now_ms;
use crate::types::{ConnectionState, FeedEvent, PoolConfig};

pub struct PoolWatcher<C> {
    pool: PoolConfig,

    /// Live feed client implementation.
    feed: Arc<C>,

    series: Arc<Mutex<PriceSeries>>,
    current: Arc<Mutex<Option<Decimal>>>,
    state: Arc<Mutex<ConnectionState>>,

    pub counters: Counters,

    shutdown: watch::Sender<bool>,
}

impl<C: FeedApi> PoolWatcher<C> {
    /// Create a new watcher wrapped in Arc<Self> for multi-task ownership.
    pub fn new(pool: PoolConfig, feed: Arc<C>, series: PriceSeries) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            pool,
            feed,
            series: Arc::new(Mutex::new(series)),
            current: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            counters: Counters::default(),
            shutdown,
        })
    }

    /// Seed the series from historical observations. Runs before `start()`;
    /// the series itself additionally merges by time, so a late seed can
    /// never overwrite newer live points.
    pub async fn seed(&self, points: Vec<PricePoint>) {
        let count = points.len() as u64;
        let latest = {
            let mut series = self.series.lock().await;
            series.seed(points);
            series.latest_observed()
        };

        let mut current = self.current.lock().await;
        if current.is_none() {
            *current = latest;
        }

        self.counters
            .backfill_points
            .fetch_add(count, Ordering::Relaxed);
        info!(points = count, "series seeded from history");
    }

    /// Spawn the subscription stream and the event processing loop.
    #[instrument(skip(self), fields(pool = %self.pool.address))]
    pub fn start(self: Arc<Self>) {
        let sub = LogSubscription {
            address: self.pool.address.clone(),
            topics: vec![SWAP_EVENT_SIGNATURE.to_string()],
        };

        let (tx, rx) = mpsc::channel(64);
        let shutdown_rx = self.shutdown.subscribe();

        let feed = Arc::clone(&self.feed);
        let stream_span = tracing::info_span!("log_stream_task", pool = %sub.address);
        tokio::spawn(
            async move {
                info!("starting log subscription stream");
                if let Err(e) = feed.stream_logs(sub, tx, shutdown_rx).await {
                    error!(error = ?e, "log subscription stream crashed");
                }
            }
            .instrument(stream_span),
        );

        let watcher = Arc::clone(&self);
        let processor_span = tracing::info_span!("event_processor_task", pool = %self.pool.address);
        tokio::spawn(
            async move {
                debug!("receiver task running for feed events");
                watcher.process_feed_events(rx).await;
            }
            .instrument(processor_span),
        );
    }

    /// Drain feed events: track connection state, decode pushed logs, and
    /// append prices in feed-delivery order. Decoder rejections are counted
    /// and dropped; they never tear down the feed.
    pub async fn process_feed_events(self: Arc<Self>, mut event_rx: Receiver<FeedEvent>) {
        info!("beginning feed event processing loop");

        while let Some(event) = event_rx.recv().await {
            self.counters.feed_events.fetch_add(1, Ordering::Relaxed);

            match event {
                FeedEvent::State(next) => self.transition(next).await,
                FeedEvent::SubscriptionAck { subscription_id } => {
                    debug!(subscription = %subscription_id, "feed acknowledged subscription");
                }
                FeedEvent::KeepAlive => {}
                FeedEvent::Unknown(frame) => {
                    debug!(frame = %frame, "ignoring unrelated feed frame");
                }
                FeedEvent::Log(raw) => match decode_swap(&raw, &self.pool) {
                    Ok(swap) => {
                        self.counters.swaps_decoded.fetch_add(1, Ordering::Relaxed);
                        debug!(price = %swap.price, tick = swap.tick, "decoded swap event");

                        *self.current.lock().await = Some(swap.price);
                        self.series.lock().await.push(now_ms(), swap.price);
                    }
                    Err(DecodeError::InvalidPrice(e)) => {
                        self.counters.invalid_price.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "dropping swap event with no derivable price");
                    }
                    Err(e) => {
                        self.counters
                            .decode_rejected
                            .fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "dropping undecodable log record");
                    }
                },
            }
        }

        warn!("feed event processing loop terminated");
    }

    async fn transition(&self, next: ConnectionState) {
        if matches!(next, ConnectionState::Degraded(_)) {
            self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
        }
        let mut state = self.state.lock().await;
        if *state != next {
            info!(from = %*state, to = %next, "connection state changed");
            *state = next;
        }
    }

    /// Evict stale points, optionally fill cadence gaps, and report
    /// counters. Driven by the periodic maintenance tick, independent of
    /// message arrival.
    pub async fn run_maintenance(&self, now_ms: u64, gap_cadence_ms: u64) {
        let mut series = self.series.lock().await;
        series.evict(now_ms);
        series.fill_gaps(now_ms, gap_cadence_ms);

        debug!(
            points = series.len(),
            decoded = self.counters.swaps_decoded.load(Ordering::Relaxed),
            rejected = self.counters.decode_rejected.load(Ordering::Relaxed),
            reconnects = self.counters.reconnects.load(Ordering::Relaxed),
            "maintenance tick"
        );
    }

    /// Request shutdown: closes the transport and cancels any pending
    /// reconnect backoff.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        *self.state.lock().await = ConnectionState::Disconnected;
        info!(pool = %self.pool.address, "pool watcher stopped");
    }

    // ---- presentation read API ----

    /// Latest decoded price, if any observation has arrived yet.
    pub async fn current_price(&self) -> Option<Decimal> {
        *self.current.lock().await
    }

    /// Immutable ordered copy of the series for rendering.
    pub async fn snapshot(&self) -> Vec<PricePoint> {
        self.series.lock().await.snapshot()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.clone()
    }
}
