use serde::Deserialize;

/// Response envelope of the historical swaps endpoint.
#[derive(Debug, Deserialize)]
pub struct SwapHistoryEnvelope {
    pub swaps: Vec<HistoricalSwap>,
}

/// One finalized swap observation returned by the indexer.
#[derive(Debug, Deserialize)]
pub struct HistoricalSwap {
    /// Block timestamp, seconds since epoch.
    pub timestamp: u64,

    /// Post-swap square-root price ratio, decimal string.
    #[serde(rename = "sqrtPriceX96")]
    pub sqrt_price_x96: String,
}
