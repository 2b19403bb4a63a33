use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use ethers_core::types::{I256, U256};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};

use engine::pricing::PairMeta;
use engine::series::{PricePoint, PriceSample, PriceSeries, SeriesBound};
use market::decode::SWAP_EVENT_SIGNATURE;
use market::feed::{FeedApi, LogSubscription};
use market::time::now_ms;
use market::types::{ConnectionState, FeedEvent, PoolConfig, RawLog};
use market::watcher::PoolWatcher;

const POOL: &str = "0x8ad599c3a0ff1de082011efddc58f1908eb6e6d8";
// $2500 against an 18/6-decimal pair
const SQRT_2500: &str = "3961408125713216879677198";

#[derive(Clone)]
struct ScriptedFeed {
    frames: Vec<FeedEvent>,
}

#[async_trait::async_trait]
impl FeedApi for ScriptedFeed {
    async fn stream_logs(
        &self,
        _sub: LogSubscription,
        sender: mpsc::Sender<FeedEvent>,
        _shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let frames = self.frames.clone();

        // simulate async feed delivery
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            for frame in frames {
                let _ = sender.send(frame).await;
            }
        });

        Ok(())
    }
}

fn pool_config() -> PoolConfig {
    PoolConfig {
        address: POOL.to_string(),
        pair: PairMeta {
            token0_decimals: 18,
            token1_decimals: 6,
            quote_in_token0: false,
        },
    }
}

fn watcher_with(frames: Vec<FeedEvent>) -> Arc<PoolWatcher<ScriptedFeed>> {
    let series = PriceSeries::new(SeriesBound::MaxAge(600_000), 0);
    PoolWatcher::new(pool_config(), Arc::new(ScriptedFeed { frames }), series)
}

fn word_hex_u256(v: U256) -> String {
    let mut b = [0u8; 32];
    v.to_big_endian(&mut b);
    hex::encode(b)
}

fn word_hex_i256(v: I256) -> String {
    word_hex_u256(v.into_raw())
}

fn pad_address(addr: &str) -> String {
    format!("0x{}{}", "0".repeat(24), addr.trim_start_matches("0x"))
}

fn valid_swap_log() -> RawLog {
    let data = format!(
        "0x{}{}{}{}{}",
        word_hex_i256(I256::from(-1_000_000_000_000_000_000i64)),
        word_hex_i256(I256::from(2_500_000_000i64)),
        word_hex_u256(U256::from_dec_str(SQRT_2500).unwrap()),
        word_hex_u256(U256::from(123_456u64)),
        word_hex_i256(I256::from(-1_000)),
    );

    RawLog {
        address: POOL.to_string(),
        topics: vec![
            SWAP_EVENT_SIGNATURE.to_string(),
            pad_address("0x1111111111111111111111111111111111111111"),
            pad_address("0x2222222222222222222222222222222222222222"),
        ],
        data,
        block_number: Some("0x10".to_string()),
        transaction_hash: None,
    }
}

fn assert_close_to(price: Decimal, want: i64) {
    let want = Decimal::from(want);
    let rel = ((price - want) / want).abs();
    assert!(rel < Decimal::new(1, 6), "got {price}, want {want}");
}

#[tokio::test]
async fn swap_event_flows_into_snapshot_and_current_price() {
    let watcher = watcher_with(vec![
        FeedEvent::SubscriptionAck {
            subscription_id: "0xabc".into(),
        },
        FeedEvent::State(ConnectionState::Subscribed),
        FeedEvent::Log(valid_swap_log()),
    ]);

    Arc::clone(&watcher).start();
    tokio::time::sleep(Duration::from_millis(80)).await;

    let snap = watcher.snapshot().await;
    assert_eq!(snap.len(), 1);
    assert_close_to(snap[0].sample.observed().unwrap(), 2500);

    assert_close_to(watcher.current_price().await.unwrap(), 2500);
    assert_eq!(watcher.connection_state().await, ConnectionState::Subscribed);
    assert_eq!(watcher.counters.swaps_decoded.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn malformed_logs_are_counted_and_dropped() {
    let mut wrong_sig = valid_swap_log();
    wrong_sig.topics[0] =
        "0x1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1".to_string();

    let mut truncated = valid_swap_log();
    truncated.data.truncate(truncated.data.len() - 64);

    let watcher = watcher_with(vec![
        FeedEvent::State(ConnectionState::Subscribed),
        FeedEvent::Log(wrong_sig),
        FeedEvent::Log(truncated),
        FeedEvent::Log(valid_swap_log()),
    ]);

    Arc::clone(&watcher).start();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(watcher.snapshot().await.len(), 1);
    assert_eq!(watcher.counters.decode_rejected.load(Ordering::Relaxed), 2);
    assert_eq!(watcher.counters.swaps_decoded.load(Ordering::Relaxed), 1);

    // single bad records never degrade the connection
    assert_eq!(watcher.connection_state().await, ConnectionState::Subscribed);
}

#[tokio::test]
async fn zero_sqrt_price_drops_the_event() {
    let mut zeroed = valid_swap_log();
    zeroed.data = format!("0x{}", "0".repeat(320));

    let watcher = watcher_with(vec![
        FeedEvent::State(ConnectionState::Subscribed),
        FeedEvent::Log(zeroed),
    ]);

    Arc::clone(&watcher).start();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(watcher.snapshot().await.is_empty());
    assert_eq!(watcher.current_price().await, None);
    assert_eq!(watcher.counters.invalid_price.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn degraded_transport_recovers_to_subscribed() {
    let watcher = watcher_with(vec![
        FeedEvent::State(ConnectionState::Subscribed),
        FeedEvent::State(ConnectionState::Degraded("stream closed".into())),
        FeedEvent::State(ConnectionState::Connecting),
        FeedEvent::State(ConnectionState::Subscribed),
    ]);

    Arc::clone(&watcher).start();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(watcher.connection_state().await, ConnectionState::Subscribed);
    assert_eq!(watcher.counters.reconnects.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn seeded_history_precedes_live_points() {
    let watcher = watcher_with(vec![
        FeedEvent::State(ConnectionState::Subscribed),
        FeedEvent::Log(valid_swap_log()),
    ]);

    let base = now_ms() - 100_000;
    watcher
        .seed(vec![
            PricePoint {
                ts_ms: base,
                sample: PriceSample::Observed(Decimal::from(2400)),
            },
            PricePoint {
                ts_ms: base + 1_000,
                sample: PriceSample::Observed(Decimal::from(2450)),
            },
        ])
        .await;

    // the seed becomes the current price until live data lands
    assert_eq!(watcher.current_price().await, Some(Decimal::from(2450)));

    Arc::clone(&watcher).start();
    tokio::time::sleep(Duration::from_millis(80)).await;

    let snap = watcher.snapshot().await;
    assert_eq!(snap.len(), 3);
    assert!(
        snap.windows(2).all(|w| w[0].ts_ms <= w[1].ts_ms),
        "series must stay ascending after seed + live append"
    );
    assert_close_to(watcher.current_price().await.unwrap(), 2500);
}

#[tokio::test]
async fn stop_marks_the_watcher_disconnected() {
    let watcher = watcher_with(vec![FeedEvent::State(ConnectionState::Subscribed)]);

    Arc::clone(&watcher).start();
    tokio::time::sleep(Duration::from_millis(40)).await;
    watcher.stop().await;

    assert_eq!(
        watcher.connection_state().await,
        ConnectionState::Disconnected
    );
}
