use serde_json::Value;

use crate::types::{FeedEvent, RawLog};

/// Classify one inbound frame of the JSON-RPC log feed.
///
/// Three envelope shapes matter:
/// - `{"id": .., "result": "0x.."}` — the subscription acknowledgment
/// - `{"method": "eth_subscription", "params": {"result": {..log..}}}` —
///   a pushed log record
/// - anything else — unrelated; surfaced as `Unknown` so the caller can
///   keep a diagnostic count without failing the stream
pub fn parse_feed_frame(raw: &str) -> Result<FeedEvent, serde_json::Error> {
    let v: Value = serde_json::from_str(raw)?;

    if v.get("method").and_then(Value::as_str) == Some("eth_subscription") {
        if let Some(result) = v.pointer("/params/result") {
            let log: RawLog = serde_json::from_value(result.clone())?;
            return Ok(FeedEvent::Log(log));
        }
    }

    if v.get("id").is_some_and(|id| !id.is_null()) {
        if let Some(sub) = v.get("result").and_then(Value::as_str) {
            return Ok(FeedEvent::SubscriptionAck {
                subscription_id: sub.to_string(),
            });
        }
    }

    Ok(FeedEvent::Unknown(v))
}
