use engine::pricing::PairMeta;
use engine::series::SeriesBound;
use market::types::PoolConfig;

#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Feed configuration
    // =========================
    /// WebSocket endpoint of the JSON-RPC log feed.
    pub feed_ws_url: String,

    /// Address of the monitored pool contract (0x-prefixed hex).
    pub pool_address: String,

    /// Decimal places of token0 / token1. Pool metadata, fixed per pool;
    /// never derived per event.
    pub token0_decimals: u8,
    pub token1_decimals: u8,

    /// Quote the price in token0 instead of token1.
    ///
    /// The raw on-chain ratio is token1-per-token0; pools that list the
    /// quote currency first (e.g. USDC as token0) need the inversion.
    pub quote_in_token0: bool,

    // =========================
    // Series configuration
    // =========================
    /// Wall-clock window of points to retain, in milliseconds.
    ///
    /// Ignored when `max_points` is set: exactly one bounding policy is in
    /// force at a time.
    pub window_ms: u64,

    /// Optional count bound; when set it replaces the wall-clock window.
    pub max_points: Option<usize>,

    /// Observations closer than this to the latest point update it in
    /// place instead of appending.
    ///
    /// Bounds series growth when the pool trades in bursts. 0 keeps every
    /// observation as its own point.
    pub coalesce_ms: u64,

    /// Cadence for "no data" placeholders during quiet stretches,
    /// in milliseconds. 0 disables gap filling.
    pub gap_fill_cadence_ms: u64,

    /// Period of the eviction/gap-fill maintenance tick.
    pub maintenance_tick_ms: u64,

    // =========================
    // Backfill configuration
    // =========================
    /// Base URL of the historical swaps endpoint.
    pub history_base_url: String,

    /// Optional bearer credential for the historical endpoint.
    pub history_api_key: Option<String>,

    /// How far back to backfill, in seconds.
    pub backfill_lookback_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            feed_ws_url: env_or_str("FEED_WS_URL", "ws://127.0.0.1:8546"),
            pool_address: env_or_str(
                "POOL_ADDRESS",
                "0x88e6a0c2ddd26feeb64f039a2c41296fca1c0c84",
            ),

            // Defaults match the USDC/WETH pool above: USDC (6 decimals)
            // is token0 and is also the quote currency.
            token0_decimals: env_or("TOKEN0_DECIMALS", 6),
            token1_decimals: env_or("TOKEN1_DECIMALS", 18),
            quote_in_token0: env_or("QUOTE_IN_TOKEN0", true),

            window_ms: env_or("WINDOW_MS", 600_000),
            max_points: std::env::var("MAX_POINTS").ok().and_then(|v| v.parse().ok()),
            coalesce_ms: env_or("COALESCE_MS", 30_000),
            gap_fill_cadence_ms: env_or("GAP_FILL_CADENCE_MS", 0),
            maintenance_tick_ms: env_or("MAINTENANCE_TICK_MS", 5_000),

            history_base_url: env_or_str("HISTORY_BASE_URL", "http://127.0.0.1:8080"),
            history_api_key: std::env::var("HISTORY_API_KEY").ok(),
            backfill_lookback_secs: env_or("BACKFILL_LOOKBACK_SECS", 600),
        }
    }

    /// Resolve the single bounding policy for the series.
    pub fn series_bound(&self) -> SeriesBound {
        match self.max_points {
            Some(n) => SeriesBound::MaxCount(n),
            None => SeriesBound::MaxAge(self.window_ms),
        }
    }

    pub fn pair(&self) -> PairMeta {
        PairMeta {
            token0_decimals: self.token0_decimals,
            token1_decimals: self.token1_decimals,
            quote_in_token0: self.quote_in_token0,
        }
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            address: self.pool_address.clone(),
            pair: self.pair(),
        }
    }
}

fn env_or_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
