//! Multi-relay query fan-out and the merge rule that manufactures one
//! consistent view out of unordered, possibly conflicting relay responses.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use futures_util::future::join_all;
use tracing::warn;

use crate::address::{address_of, supersedes, Address};
use crate::event::Event;
use crate::relay::{self, Filter, RelaySet};

/// Query every relay in the set concurrently and merge the union.
///
/// Each relay task owns its own buffer and is bounded by the set's deadline;
/// the join never waits past the slowest permitted relay, and a relay that
/// fails or times out simply contributes nothing.
pub async fn query_all(relays: &RelaySet, filter: &Filter) -> Vec<Event> {
    let tasks: Vec<_> = relays
        .urls
        .iter()
        .map(|url| {
            let url = url.clone();
            let filter = filter.clone();
            let socks = relays.socks.clone();
            let deadline = relays.timeout;
            tokio::spawn(async move { relay::query(&url, &filter, socks.as_deref(), deadline).await })
        })
        .collect();
    let mut all = vec![];
    for joined in join_all(tasks).await {
        match joined {
            Ok(events) => all.extend(events),
            Err(e) => warn!(error = %e, "relay query task failed"),
        }
    }
    merge_events(all)
}

/// Pure merge reducer over a union of relay responses.
///
/// Duplicates collapse by id. For addressed kinds only the version with the
/// greatest `created_at` per address survives; append-only events are all
/// kept. The result is ordered newest-first (id as tie-break) so the same
/// input set always merges to the same output, whatever order relays
/// answered in.
pub fn merge_events(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    let mut current: HashMap<Address, Event> = HashMap::new();
    let mut plain = vec![];
    for ev in events {
        if !seen.insert(ev.id.clone()) {
            continue;
        }
        match address_of(&ev) {
            Some(addr) => match current.entry(addr) {
                Entry::Occupied(mut slot) => {
                    if supersedes(&ev, slot.get()) {
                        slot.insert(ev);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(ev);
                }
            },
            None => plain.push(ev),
        }
    }
    let mut merged: Vec<Event> = current.into_values().chain(plain).collect();
    merged.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}
