//! In-process mock relay and fixture helpers shared by unit tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use secp256k1::{Keypair, Message, Secp256k1};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message as TMsg};

use crate::event::{event_hash, Event, Tag};
use crate::relay::RelaySet;
use crate::signer::Keys;

/// Serializes tests that touch process environment variables.
pub static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Deterministic signing identity from a one-byte seed.
pub fn test_keys(seed: u8) -> Keys {
    Keys::from_secret_hex(&format!("{seed:02x}").repeat(32)).unwrap()
}

/// Hex public key for a seed, without keeping the secret around.
pub fn test_pubkey(seed: u8) -> String {
    test_keys(seed).pubkey
}

/// Build a fully signed event with a fixed timestamp.
pub fn signed_event(seed: u8, kind: u32, created_at: u64, tags: Vec<Tag>, content: &str) -> Event {
    let secp = Secp256k1::new();
    let kp = Keypair::from_seckey_slice(&secp, &[seed; 32]).unwrap();
    let mut ev = Event {
        id: String::new(),
        pubkey: hex::encode(kp.x_only_public_key().0.serialize()),
        kind,
        created_at,
        tags,
        content: content.into(),
        sig: String::new(),
    };
    let hash = event_hash(&ev).unwrap();
    ev.id = hex::encode(hash);
    let msg = Message::from_digest_slice(&hash).unwrap();
    let sig = secp.sign_schnorr_no_aux_rand(&msg, &kp);
    ev.sig = hex::encode(sig.as_ref());
    ev
}

/// A relay speaking just enough NIP-01 to serve canned events and ack
/// publishes, accepting any number of sequential connections.
pub struct MockRelay {
    /// `ws://…` URL of the listener.
    pub url: String,
    handle: JoinHandle<()>,
    published: Arc<Mutex<Vec<Event>>>,
}

impl MockRelay {
    /// Relay serving `events` and accepting every publish.
    pub async fn spawn(events: Vec<Event>) -> Self {
        Self::spawn_with_ack(events, true, "").await
    }

    /// Relay serving `events` and answering every publish with the given ack.
    pub async fn spawn_with_ack(events: Vec<Event>, ok: bool, message: &str) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let published = Arc::new(Mutex::new(vec![]));
        let published_clone = published.clone();
        let message = message.to_string();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let events = events.clone();
                let published = published_clone.clone();
                let message = message.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        let TMsg::Text(txt) = msg else { continue };
                        let Ok(val) = serde_json::from_str::<Value>(&txt) else {
                            continue;
                        };
                        let Some(arr) = val.as_array() else { continue };
                        match arr.first().and_then(|v| v.as_str()) {
                            Some("REQ") if arr.len() >= 3 => {
                                let sub = arr[1].as_str().unwrap_or_default().to_string();
                                let filter = &arr[2];
                                // newest-first like a real relay, so `limit`
                                // keeps the most recent matches
                                let mut matches: Vec<&Event> = events
                                    .iter()
                                    .filter(|ev| filter_matches(ev, filter))
                                    .collect();
                                matches.sort_by_key(|ev| std::cmp::Reverse(ev.created_at));
                                if let Some(limit) =
                                    filter.get("limit").and_then(|v| v.as_u64())
                                {
                                    matches.truncate(limit as usize);
                                }
                                for ev in matches {
                                    let frame = json!(["EVENT", sub, ev]);
                                    let _ = ws.send(TMsg::Text(frame.to_string())).await;
                                }
                                let _ = ws
                                    .send(TMsg::Text(json!(["EOSE", sub]).to_string()))
                                    .await;
                            }
                            Some("EVENT") if arr.len() >= 2 => {
                                if let Ok(ev) =
                                    serde_json::from_value::<Event>(arr[1].clone())
                                {
                                    let id = ev.id.clone();
                                    published.lock().unwrap().push(ev);
                                    let _ = ws
                                        .send(TMsg::Text(
                                            json!(["OK", id, ok, message]).to_string(),
                                        ))
                                        .await;
                                }
                            }
                            _ => {}
                        }
                    }
                });
            }
        });
        MockRelay {
            url: format!("ws://{}", addr),
            handle,
            published,
        }
    }

    /// Relay accepting connections but never answering any frame.
    pub async fn spawn_silent() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let Ok(mut ws) = accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });
        MockRelay {
            url: format!("ws://{}", addr),
            handle,
            published: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Events the relay has been asked to store.
    pub fn published(&self) -> Vec<Event> {
        self.published.lock().unwrap().clone()
    }
}

impl Drop for MockRelay {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Relay set over the given mock relays with a short test deadline.
pub fn relay_set(relays: &[&MockRelay]) -> RelaySet {
    let mut set = RelaySet::new(relays.iter().map(|r| r.url.clone()).collect());
    set.timeout = std::time::Duration::from_secs(2);
    set
}

/// Minimal NIP-01 filter evaluation for the mock relay.
fn filter_matches(ev: &Event, filter: &Value) -> bool {
    if let Some(ids) = filter.get("ids").and_then(|v| v.as_array()) {
        if !ids.iter().any(|v| v.as_str() == Some(ev.id.as_str())) {
            return false;
        }
    }
    if let Some(authors) = filter.get("authors").and_then(|v| v.as_array()) {
        if !authors
            .iter()
            .any(|v| v.as_str() == Some(ev.pubkey.as_str()))
        {
            return false;
        }
    }
    if let Some(kinds) = filter.get("kinds").and_then(|v| v.as_array()) {
        if !kinds.iter().any(|v| v.as_u64() == Some(ev.kind as u64)) {
            return false;
        }
    }
    if let Some(since) = filter.get("since").and_then(|v| v.as_u64()) {
        if ev.created_at < since {
            return false;
        }
    }
    if let Some(until) = filter.get("until").and_then(|v| v.as_u64()) {
        if ev.created_at > until {
            return false;
        }
    }
    if let Some(obj) = filter.as_object() {
        for (key, values) in obj {
            let Some(tag_name) = key.strip_prefix('#') else {
                continue;
            };
            let Some(values) = values.as_array() else {
                continue;
            };
            let matched = ev.tag_values(tag_name).any(|tag_val| {
                values.iter().any(|v| v.as_str() == Some(tag_val))
            });
            if !matched {
                return false;
            }
        }
    }
    true
}
