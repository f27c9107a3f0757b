//! Badge issuance and inbox state derived from the aggregated relay view.
//!
//! Read operations are single aggregated queries; mutating operations sign
//! an event with the caller's keys and publish it to every relay, succeeding
//! once any relay holds it.

use tracing::info;

use crate::address::Address;
use crate::aggregate::query_all;
use crate::error::Result;
use crate::event::{KIND_BADGE_AWARD, KIND_BADGE_DEFINITION, KIND_PROFILE_BADGES};
use crate::model::{
    award_draft, definition_draft, BadgeAward, BadgeDefinition, ProfileBadgeList,
};
use crate::publish::{publish_event, Published};
use crate::relay::{Filter, RelaySet};
use crate::signer::Keys;

/// Resolve the current version of a badge definition.
pub async fn resolve_definition(relays: &RelaySet, address: &Address) -> Option<BadgeDefinition> {
    let filter = Filter::kind(KIND_BADGE_DEFINITION)
        .author(&address.author)
        .tag("d", &address.identifier)
        .limit(1);
    let events = query_all(relays, &filter).await;
    events.first().and_then(BadgeDefinition::from_event)
}

/// List the current badge definitions published by an issuer.
pub async fn definitions_by_issuer(
    relays: &RelaySet,
    issuer: &str,
    limit: u32,
) -> Vec<BadgeDefinition> {
    let filter = Filter::kind(KIND_BADGE_DEFINITION)
        .author(issuer)
        .limit(limit);
    query_all(relays, &filter)
        .await
        .iter()
        .filter_map(BadgeDefinition::from_event)
        .collect()
}

/// All award events naming a recipient, one entry per grant.
pub async fn awards_for(relays: &RelaySet, recipient: &str) -> Vec<BadgeAward> {
    let filter = Filter::kind(KIND_BADGE_AWARD).tag("p", recipient).limit(50);
    query_all(relays, &filter)
        .await
        .iter()
        .filter_map(BadgeAward::from_event)
        .collect()
}

/// Issuer-signed awards of one definition — who holds this badge.
pub async fn awards_of(relays: &RelaySet, definition: &Address) -> Vec<BadgeAward> {
    let filter = Filter::kind(KIND_BADGE_AWARD)
        .author(&definition.author)
        .tag("a", &definition.to_string());
    query_all(relays, &filter)
        .await
        .iter()
        .filter_map(BadgeAward::from_event)
        .collect()
}

/// The owner's current accepted-badge list, empty when none is published.
pub async fn accepted_list(relays: &RelaySet, owner: &str) -> ProfileBadgeList {
    let filter = Filter::kind(KIND_PROFILE_BADGES).author(owner).limit(1);
    let events = query_all(relays, &filter).await;
    events
        .first()
        .and_then(ProfileBadgeList::from_event)
        .unwrap_or_else(|| ProfileBadgeList::empty(owner))
}

/// Awards to a recipient whose definition is not yet accepted.
///
/// Each award event stays a separate pending item until it is individually
/// accepted or its definition appears in the accepted list.
pub async fn pending_awards(relays: &RelaySet, recipient: &str) -> Vec<BadgeAward> {
    let accepted = accepted_list(relays, recipient).await;
    awards_for(relays, recipient)
        .await
        .into_iter()
        .filter(|award| !accepted.contains_definition(&award.definition))
        .collect()
}

/// Create or update a badge definition and publish it.
pub async fn create_definition(
    relays: &RelaySet,
    keys: &Keys,
    identifier: &str,
    name: &str,
    description: &str,
    image: &str,
) -> Result<Published> {
    let ev = keys.sign(definition_draft(identifier, name, description, image))?;
    info!(identifier, "publishing badge definition");
    publish_event(relays, &ev).await
}

/// Award a definition to one or more recipients.
pub async fn award_badge(
    relays: &RelaySet,
    keys: &Keys,
    definition: &Address,
    recipients: &[String],
) -> Result<Published> {
    let ev = keys.sign(award_draft(definition, recipients))?;
    info!(definition = %definition, recipients = recipients.len(), "publishing badge award");
    publish_event(relays, &ev).await
}

/// Accept an award: read the current list, append the pair, republish the
/// whole list.
///
/// The read-merge-rewrite is not protected against concurrent writers; the
/// protocol has no conditional write, so two sessions accepting different
/// badges at once can lose one update.
pub async fn accept_badge(
    relays: &RelaySet,
    keys: &Keys,
    definition: &Address,
    award_id: &str,
) -> Result<Published> {
    let mut list = accepted_list(relays, &keys.pubkey).await;
    if !list.contains(definition, award_id) {
        list.pairs.push((definition.clone(), award_id.to_string()));
    }
    let ev = keys.sign(list.to_draft())?;
    info!(definition = %definition, total = list.pairs.len(), "accepting badge");
    publish_event(relays, &ev).await
}

/// Remove an accepted award by exact (definition, award id) match and
/// republish the remaining list. Same race caveat as [`accept_badge`].
pub async fn remove_badge(
    relays: &RelaySet,
    keys: &Keys,
    definition: &Address,
    award_id: &str,
) -> Result<Published> {
    let mut list = accepted_list(relays, &keys.pubkey).await;
    list.pairs
        .retain(|(addr, id)| !(addr == definition && id == award_id));
    let ev = keys.sign(list.to_draft())?;
    info!(definition = %definition, remaining = list.pairs.len(), "removing badge");
    publish_event(relays, &ev).await
}
