//! Single-relay WebSocket transport.
//!
//! One connection per call, no retries, no cross-call state. A relay that is
//! unreachable, slow, or speaks garbage is indistinguishable from a relay
//! with nothing to say: `query` returns whatever was collected (possibly
//! nothing) and `publish` reports an unaccepted ack. Failures are logged at
//! debug level and never propagated.

use std::{collections::BTreeMap, time::Duration};

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async, tungstenite::Message, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::event::{verify_event, Event};

/// Idle bound between consecutive frames from a relay.
const IDLE_TIMEOUT: Duration = Duration::from_millis(2500);

/// The configured relay endpoints plus the single deadline applied to every
/// per-relay call. Read-only once built; safe to share across tasks.
#[derive(Debug, Clone)]
pub struct RelaySet {
    /// Relay WebSocket URLs in configuration order.
    pub urls: Vec<String>,
    /// Optional SOCKS5 proxy (host:port), e.g. for Tor.
    pub socks: Option<String>,
    /// Deadline bounding each relay connection's lifetime.
    pub timeout: Duration,
}

impl RelaySet {
    /// Relay set with the default 7 second per-relay deadline.
    pub fn new(urls: Vec<String>) -> Self {
        RelaySet {
            urls,
            socks: None,
            timeout: Duration::from_secs(7),
        }
    }
}

/// Subscription filter sent in a `REQ` frame.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Restrict to specific event ids.
    pub ids: Option<Vec<String>>,
    /// Restrict to specific authors.
    pub authors: Option<Vec<String>>,
    /// Restrict to event kinds.
    pub kinds: Option<Vec<u32>>,
    /// Tag filters keyed by tag name without the `#` prefix.
    pub tags: BTreeMap<String, Vec<String>>,
    /// Lower bound for `created_at`.
    pub since: Option<u64>,
    /// Upper bound for `created_at`.
    pub until: Option<u64>,
    /// Maximum number of events requested.
    pub limit: Option<u32>,
}

impl Filter {
    /// Filter matching a single kind.
    pub fn kind(kind: u32) -> Self {
        Filter {
            kinds: Some(vec![kind]),
            ..Default::default()
        }
    }

    /// Add an event id.
    pub fn id(mut self, id: &str) -> Self {
        self.ids.get_or_insert_with(Vec::new).push(id.to_string());
        self
    }

    /// Add an author.
    pub fn author(mut self, pubkey: &str) -> Self {
        self.authors
            .get_or_insert_with(Vec::new)
            .push(pubkey.to_string());
        self
    }

    /// Add a tag filter value, e.g. `tag("p", recipient)` for `#p`.
    pub fn tag(mut self, name: &str, value: &str) -> Self {
        self.tags
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Cap the number of requested events.
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Encode as the NIP-01 filter JSON object.
    pub fn to_json(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        if let Some(ids) = &self.ids {
            map.insert(
                "ids".into(),
                Value::Array(ids.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(authors) = &self.authors {
            map.insert(
                "authors".into(),
                Value::Array(authors.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(kinds) = &self.kinds {
            map.insert(
                "kinds".into(),
                Value::Array(kinds.iter().map(|k| Value::Number((*k).into())).collect()),
            );
        }
        for (tag, values) in &self.tags {
            map.insert(
                format!("#{tag}"),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(since) = self.since {
            map.insert("since".into(), Value::Number(since.into()));
        }
        if let Some(until) = self.until {
            map.insert("until".into(), Value::Number(until.into()));
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), Value::Number(limit.into()));
        }
        map
    }
}

/// Acknowledgment of a publish attempt on one relay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ack {
    /// Whether the relay reported acceptance.
    pub accepted: bool,
    /// The relay's message, empty when no ack arrived in time.
    pub message: String,
}

/// Issue one `REQ` against a relay and collect events until `EOSE`, the
/// deadline, or an idle gap, whichever comes first.
///
/// Events failing the id/signature check are dropped as malformed. Any
/// transport failure yields an empty result.
pub async fn query(url: &str, filter: &Filter, socks: Option<&str>, deadline: Duration) -> Vec<Event> {
    let started = Instant::now();
    let mut ws = match timeout(deadline, connect_ws(url, socks)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            debug!(relay = url, error = %e, "relay connect failed");
            return vec![];
        }
        Err(_) => {
            debug!(relay = url, "relay connect timed out");
            return vec![];
        }
    };

    let sub_id = subscription_id();
    let req = json!(["REQ", sub_id, Value::Object(filter.to_json())]);
    if ws.send(Message::Text(req.to_string())).await.is_err() {
        debug!(relay = url, "failed to send REQ");
        return vec![];
    }

    let mut events = vec![];
    loop {
        let Some(remaining) = deadline.checked_sub(started.elapsed()) else {
            break;
        };
        let msg = match timeout(IDLE_TIMEOUT.min(remaining), ws.next()).await {
            Ok(Some(Ok(msg))) => msg,
            // idle gap, stream end, or protocol error all end the collection
            _ => break,
        };
        match msg {
            Message::Text(txt) => {
                let Ok(val) = serde_json::from_str::<Value>(&txt) else {
                    continue;
                };
                let Some(arr) = val.as_array() else { continue };
                match arr.first().and_then(|v| v.as_str()) {
                    Some("EVENT")
                        if arr.len() >= 3
                            && arr.get(1).and_then(|v| v.as_str()) == Some(&sub_id) =>
                    {
                        if let Ok(ev) = serde_json::from_value::<Event>(arr[2].clone()) {
                            match verify_event(&ev) {
                                Ok(()) => events.push(ev),
                                Err(e) => {
                                    debug!(relay = url, id = %ev.id, error = %e, "dropping malformed event")
                                }
                            }
                        }
                    }
                    Some("EOSE") if arr.get(1).and_then(|v| v.as_str()) == Some(&sub_id) => {
                        break
                    }
                    _ => {}
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    let _ = ws.close(None).await;
    events
}

/// Send one event to a relay and wait for its `OK` frame.
///
/// No ack within the deadline, or any transport failure, is reported as
/// `accepted = false` with an empty message.
pub async fn publish(url: &str, event: &Event, socks: Option<&str>, deadline: Duration) -> Ack {
    let started = Instant::now();
    let mut ws = match timeout(deadline, connect_ws(url, socks)).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            debug!(relay = url, error = %e, "relay connect failed");
            return Ack::default();
        }
        Err(_) => {
            debug!(relay = url, "relay connect timed out");
            return Ack::default();
        }
    };

    let frame = json!(["EVENT", event]);
    if ws.send(Message::Text(frame.to_string())).await.is_err() {
        debug!(relay = url, "failed to send event");
        return Ack::default();
    }

    let mut ack = Ack::default();
    loop {
        let Some(remaining) = deadline.checked_sub(started.elapsed()) else {
            break;
        };
        let msg = match timeout(IDLE_TIMEOUT.min(remaining), ws.next()).await {
            Ok(Some(Ok(msg))) => msg,
            _ => break,
        };
        match msg {
            Message::Text(txt) => {
                let Ok(val) = serde_json::from_str::<Value>(&txt) else {
                    continue;
                };
                let Some(arr) = val.as_array() else { continue };
                if arr.first().and_then(|v| v.as_str()) == Some("OK")
                    && arr.get(1).and_then(|v| v.as_str()) == Some(event.id.as_str())
                {
                    ack.accepted = arr.get(2).and_then(|v| v.as_bool()).unwrap_or(false);
                    ack.message = arr
                        .get(3)
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    let _ = ws.close(None).await;
    ack
}

/// Locally generated subscription id for one `REQ`.
fn subscription_id() -> String {
    format!("badgr-{:08x}", rand::random::<u32>())
}

/// Establish a WebSocket connection, optionally via a SOCKS5 proxy.
async fn connect_ws(
    relay: &str,
    socks: Option<&str>,
) -> Result<WebSocketStream<Box<dyn AsyncReadWrite + Unpin + Send>>> {
    let url = Url::parse(relay)?;
    let host = url.host_str().ok_or_else(|| anyhow!("missing host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("missing port"))?;
    let req = relay.into_client_request()?;
    let stream: Box<dyn AsyncReadWrite + Unpin + Send> = if let Some(proxy) = socks {
        Box::new(Socks5Stream::connect(proxy, (host, port)).await?)
    } else {
        Box::new(TcpStream::connect((host, port)).await?)
    };
    let (ws, _) = client_async(req, stream).await?;
    Ok(ws)
}

/// Blanket trait for boxed async read/write streams.
trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
