use std::time::Duration;

use ethers_core::types::U256;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use engine::pricing::{PairMeta, price_from_sqrt_x96};
use engine::series::{PricePoint, PriceSample};

use crate::history::errors::HistoryError;
use crate::history::types::{HistoricalSwap, SwapHistoryEnvelope};

#[derive(Clone)]
pub struct HistoryClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HistoryClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, HistoryError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Fetch finalized swaps at or after `from_secs`.
    #[instrument(skip(self), fields(from_secs = from_secs), level = "debug")]
    pub async fn fetch_swaps(&self, from_secs: u64) -> Result<Vec<HistoricalSwap>, HistoryError> {
        let url = format!("{}/swaps", self.base_url);

        let mut req = self.http.get(&url).query(&[("from", from_secs)]);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?.error_for_status()?;
        let envelope: SwapHistoryEnvelope = resp.json().await?;

        debug!(count = envelope.swaps.len(), "historical swaps fetched");

        Ok(envelope.swaps)
    }
}

/// Convert indexer rows into series points through the same converter as
/// the live path, sorted ascending by time. Rows without a derivable price
/// are skipped.
pub fn points_from_swaps(swaps: &[HistoricalSwap], pair: &PairMeta) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = swaps
        .iter()
        .filter_map(|swap| {
            let sqrt = match U256::from_dec_str(&swap.sqrt_price_x96) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, raw = %swap.sqrt_price_x96, "skipping unparsable sqrt price");
                    return None;
                }
            };

            match price_from_sqrt_x96(sqrt, pair) {
                Ok(price) => Some(PricePoint {
                    ts_ms: swap.timestamp * 1000,
                    sample: PriceSample::Observed(price),
                }),
                Err(e) => {
                    warn!(error = %e, "skipping historical swap with no derivable price");
                    None
                }
            }
        })
        .collect();

    points.sort_by_key(|p| p.ts_ms);
    points
}
