pub mod parser;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::{mpsc::Sender, watch};

use crate::types::FeedEvent;

/// Parameters of a single `eth_subscribe("logs")` subscription.
#[derive(Clone, Debug)]
pub struct LogSubscription {
    /// Emitting contract to filter on.
    pub address: String,

    /// topic[0] filters; a single entry pins the event signature.
    pub topics: Vec<String>,
}

/// High-level abstraction over the live log feed.
#[async_trait]
pub trait FeedApi: Send + Sync + 'static {
    /// Run the subscription, forwarding feed events into `sender` until the
    /// shutdown flag flips. Implementations own reconnection; a returned
    /// error means the worker cannot continue at all (e.g. the consumer
    /// went away).
    async fn stream_logs(
        &self,
        sub: LogSubscription,
        sender: Sender<FeedEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()>;
}
