use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc::Sender, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use super::{FeedApi, LogSubscription, parser::parse_feed_frame};
use crate::types::{ConnectionState, FeedEvent};

/// Fixed delay between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// WebSocket implementation of the log feed.
pub struct LogWsClient {
    pub ws_url: String,
}

impl LogWsClient {
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// The JSON-RPC subscription request, identical on every (re)connect.
    fn build_subscribe_request(sub: &LogSubscription) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["logs", {
                "address": sub.address,
                "topics": sub.topics,
            }]
        })
    }

    /// Send the single subscription request for this connection.
    #[instrument(skip(write, sub), fields(pool = %sub.address))]
    async fn send_subscribe<E>(
        write: &mut (impl futures::Sink<Message, Error = E> + Unpin),
        sub: &LogSubscription,
    ) -> anyhow::Result<()>
    where
        E: std::fmt::Debug + Send + Sync + 'static,
    {
        let req = Self::build_subscribe_request(sub);
        let text = serde_json::to_string(&req)?;
        debug!(payload = %text, "sending eth_subscribe request");

        write.send(Message::Text(text.into())).await.map_err(|e| {
            error!(error = ?e, "failed to send subscription over WebSocket");
            anyhow::anyhow!("{:?}", e)
        })?;

        Ok(())
    }
}

#[async_trait]
impl FeedApi for LogWsClient {
    /// Run the log subscription with resilient reconnection and tracing.
    #[instrument(skip(self, sub, sender, shutdown), fields(url = %self.ws_url, pool = %sub.address))]
    async fn stream_logs(
        &self,
        sub: LogSubscription,
        sender: Sender<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        info!("starting log feed worker");

        loop {
            if *shutdown.borrow() {
                let _ = sender
                    .send(FeedEvent::State(ConnectionState::Disconnected))
                    .await;
                info!("log feed worker stopped");
                return Ok(());
            }

            send_event(&sender, FeedEvent::State(ConnectionState::Connecting)).await?;

            debug!("attempting connection to log feed");
            match connect_async(&self.ws_url).await {
                Ok((ws, _)) => {
                    info!("WebSocket connection established");
                    let (mut write, mut read) = ws.split();

                    if let Err(e) = Self::send_subscribe(&mut write, &sub).await {
                        error!(error = ?e, "initial subscription failed; retrying connection");
                        send_event(
                            &sender,
                            FeedEvent::State(ConnectionState::Degraded(format!(
                                "subscribe failed: {e:?}"
                            ))),
                        )
                        .await?;
                    } else {
                        // Process all messages until this socket dies.
                        loop {
                            let msg = tokio::select! {
                                _ = wait_for_shutdown(&mut shutdown) => {
                                    let _ = sender
                                        .send(FeedEvent::State(ConnectionState::Disconnected))
                                        .await;
                                    info!("log feed worker stopped");
                                    return Ok(());
                                }
                                msg = read.next() => msg,
                            };

                            let Some(msg) = msg else {
                                warn!("WebSocket stream closed by remote");
                                send_event(
                                    &sender,
                                    FeedEvent::State(ConnectionState::Degraded(
                                        "stream closed".into(),
                                    )),
                                )
                                .await?;
                                break;
                            };

                            let msg = match msg {
                                Ok(m) => m,
                                Err(e) => {
                                    warn!(error = ?e, "WebSocket stream error encountered");
                                    send_event(
                                        &sender,
                                        FeedEvent::State(ConnectionState::Degraded(format!(
                                            "{e:?}"
                                        ))),
                                    )
                                    .await?;
                                    break;
                                }
                            };

                            if msg.is_ping() || msg.is_pong() {
                                debug!("received keep-alive frame");
                                send_event(&sender, FeedEvent::KeepAlive).await?;
                                continue;
                            }

                            if !msg.is_text() {
                                debug!(msg_type = ?msg, "ignoring non-text WebSocket message");
                                continue;
                            }

                            let raw = match msg.to_text() {
                                Ok(t) => t,
                                Err(e) => {
                                    error!(error = ?e, "failed to extract text from WS message");
                                    continue;
                                }
                            };

                            // Only log raw frames at TRACE to avoid production log bloat
                            tracing::trace!(raw_frame = %raw, "received raw WebSocket message");

                            match parse_feed_frame(raw) {
                                Ok(FeedEvent::SubscriptionAck { subscription_id }) => {
                                    info!(subscription = %subscription_id, "subscription acknowledged");
                                    send_event(
                                        &sender,
                                        FeedEvent::SubscriptionAck { subscription_id },
                                    )
                                    .await?;
                                    send_event(
                                        &sender,
                                        FeedEvent::State(ConnectionState::Subscribed),
                                    )
                                    .await?;
                                }
                                Ok(ev) => {
                                    debug!(event = ?ev, "parsed feed event, forwarding to channel");
                                    send_event(&sender, ev).await?;
                                }
                                Err(e) => {
                                    // A single malformed frame never tears down the connection.
                                    warn!(error = ?e, raw = %raw, "failed to parse incoming WebSocket frame");
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = ?e, "WebSocket connection failed");
                    send_event(
                        &sender,
                        FeedEvent::State(ConnectionState::Degraded(format!(
                            "connect failed: {e}"
                        ))),
                    )
                    .await?;
                }
            }

            warn!(interval = ?RECONNECT_DELAY, "disconnected; reconnecting after backoff");
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => {
                    let _ = sender
                        .send(FeedEvent::State(ConnectionState::Disconnected))
                        .await;
                    info!("log feed worker stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
        }
    }
}

/// Resolves once the shutdown flag flips (or its sender is gone).
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn send_event(sender: &Sender<FeedEvent>, ev: FeedEvent) -> anyhow::Result<()> {
    sender
        .send(ev)
        .await
        .map_err(|e| anyhow::anyhow!("feed channel closed: {e}"))
}
