//! Multi-relay publish fan-out and the acceptance verdict.
//!
//! The write contract is deliberately weak: the operation succeeds when at
//! least one relay now holds the event. The accepted count is surfaced so
//! callers can report confidence, but no higher threshold is enforced here.

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::relay::{self, Ack, RelaySet};

/// One relay's acknowledgment, kept per-relay so partial failure stays
/// observable to callers and tests even though the operation contract
/// hides it.
#[derive(Debug, Clone)]
pub struct RelayAck {
    /// Relay URL the ack came from.
    pub relay: String,
    /// The acknowledgment (default when the relay never answered).
    pub ack: Ack,
}

/// Outcome of publishing one event to every configured relay.
#[derive(Debug, Clone)]
pub struct PublishSummary {
    /// Relays that accepted the event or already had it.
    pub accepted: usize,
    /// Total relays attempted.
    pub total: usize,
    /// Per-relay acknowledgments in configuration order.
    pub acks: Vec<RelayAck>,
}

impl PublishSummary {
    /// At least one relay now holds the event.
    pub fn succeeded(&self) -> bool {
        self.accepted >= 1
    }
}

/// Successful publish result handed to callers of mutating operations.
#[derive(Debug, Clone)]
pub struct Published {
    /// Id of the published event.
    pub event_id: String,
    /// Relays that accepted it.
    pub accepted: usize,
    /// Total relays attempted.
    pub total: usize,
}

/// Send an event to every relay concurrently and classify the acks.
pub async fn publish_all(relays: &RelaySet, event: &Event) -> PublishSummary {
    let tasks: Vec<_> = relays
        .urls
        .iter()
        .map(|url| {
            let url = url.clone();
            let event = event.clone();
            let socks = relays.socks.clone();
            let deadline = relays.timeout;
            tokio::spawn(async move {
                let ack = relay::publish(&url, &event, socks.as_deref(), deadline).await;
                RelayAck { relay: url, ack }
            })
        })
        .collect();
    let mut acks = vec![];
    for joined in join_all(tasks).await {
        match joined {
            Ok(ack) => acks.push(ack),
            Err(e) => warn!(error = %e, "relay publish task failed"),
        }
    }
    let accepted = acks.iter().filter(|a| counts_as_accepted(&a.ack)).count();
    PublishSummary {
        accepted,
        total: relays.urls.len(),
        acks,
    }
}

/// A relay counts as holding the event when it accepted it, or when it
/// reports a duplicate: the event is known present there regardless of who
/// put it there.
fn counts_as_accepted(ack: &Ack) -> bool {
    ack.accepted || ack.message.to_lowercase().contains("duplicate")
}

/// Publish an event and turn a zero-acceptance outcome into [`Error::NoQuorum`].
pub async fn publish_event(relays: &RelaySet, event: &Event) -> Result<Published> {
    let summary = publish_all(relays, event).await;
    if !summary.succeeded() {
        warn!(id = %event.id, total = summary.total, "no relay accepted event");
        return Err(Error::NoQuorum);
    }
    info!(
        id = %event.id,
        accepted = summary.accepted,
        total = summary.total,
        "event published"
    );
    Ok(Published {
        event_id: event.id.clone(),
        accepted: summary.accepted,
        total: summary.total,
    })
}
