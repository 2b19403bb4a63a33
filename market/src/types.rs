use std::fmt;

use ethers_core::types::{I256, U256};
use rust_decimal::Decimal;
use serde::Deserialize;

use engine::pricing::PairMeta;

/// Raw log record as pushed by an `eth_subscribe("logs")` feed.
///
/// Treated as an untrusted, loosely-typed payload: everything here is
/// validated by the decoder before any structured type is built from it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Emitting contract address, 0x-prefixed hex.
    pub address: String,

    /// topic[0] is the event signature hash; the rest are indexed fields.
    pub topics: Vec<String>,

    /// Non-indexed payload, 0x-prefixed hex.
    pub data: String,

    /// Provenance; some feeds omit these.
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// One decoded swap. Immutable once constructed; a pure function of the raw
/// log bytes and the pool metadata.
#[derive(Debug, Clone)]
pub struct SwapEvent {
    /// Indexed addresses, lowercase 0x hex.
    pub sender: String,
    pub recipient: String,

    /// Token deltas; one positive, one negative per swap.
    pub amount0: I256,
    pub amount1: I256,

    /// Post-swap square-root price, Q64.96.
    pub sqrt_price_x96: U256,

    /// Pool liquidity after the swap.
    pub liquidity: u128,

    /// Discretized price tick after the swap (int24 range).
    pub tick: i32,

    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,

    /// Derived decimal price, computed once at decode time.
    pub price: Decimal,
}

/// Unified feed event enum forwarded from the transport to the watcher.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The feed acknowledged the subscription with its assigned id.
    SubscriptionAck { subscription_id: String },

    /// A pushed log record.
    Log(RawLog),

    /// Transport-level state transition.
    State(ConnectionState),

    KeepAlive,

    /// Unrelated or unrecognized frame, kept for diagnostics.
    Unknown(serde_json::Value),
}

/// Lifecycle of the live subscription. Exactly one instance per watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    /// Transport failed; reason kept for observability. A reconnect is
    /// pending while in this state.
    Degraded(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Subscribed => write!(f, "subscribed"),
            ConnectionState::Degraded(reason) => write!(f, "degraded: {reason}"),
        }
    }
}

/// Static configuration of the monitored pool.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Pool contract address, 0x-prefixed hex.
    pub address: String,

    /// Token pair metadata driving price conversion.
    pub pair: PairMeta,
}
