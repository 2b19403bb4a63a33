use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub feed_events: Arc<AtomicU64>,
    pub swaps_decoded: Arc<AtomicU64>,

    // drop reasons
    pub decode_rejected: Arc<AtomicU64>,
    pub invalid_price: Arc<AtomicU64>,

    pub reconnects: Arc<AtomicU64>,
    pub backfill_points: Arc<AtomicU64>,
}
