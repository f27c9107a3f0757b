//! Badge request lifecycle: solicitation, withdrawal, denial, revocation,
//! and the precedence rule deriving a request's state.

use std::fmt;

use tracing::info;

use crate::address::Address;
use crate::aggregate::query_all;
use crate::badges::{award_badge, resolve_definition};
use crate::error::Result;
use crate::event::{KIND_BADGE_AWARD, KIND_BADGE_DENIAL, KIND_BADGE_REQUEST};
use crate::model::{
    denial_draft, request_draft, revocation_draft, withdrawal_draft, BadgeDefinition,
    BadgeDenial, BadgeRequest, ProofRef,
};
use crate::profile::{fetch_profile, Profile};
use crate::proof::{verify_proof, ProofResult};
use crate::publish::{publish_event, Published};
use crate::relay::{Filter, RelaySet};
use crate::signer::Keys;

/// Lifecycle state of a badge request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// No award or active denial exists yet.
    Pending,
    /// A matching award exists; terminal, dominates any denial.
    Fulfilled,
    /// An active (non-revoked) denial exists; reversible by revocation.
    Denied,
    /// The requester withdrew the request; terminal.
    Withdrawn,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Pending => "pending",
            RequestState::Fulfilled => "fulfilled",
            RequestState::Denied => "denied",
            RequestState::Withdrawn => "withdrawn",
        };
        f.write_str(s)
    }
}

/// Fetch a request event by id.
pub async fn fetch_request(relays: &RelaySet, id: &str) -> Option<BadgeRequest> {
    let filter = Filter::kind(KIND_BADGE_REQUEST).id(id).limit(1);
    let events = query_all(relays, &filter).await;
    events.first().and_then(BadgeRequest::from_event)
}

/// Derive the state of a request.
///
/// Precedence is fixed: a withdrawn marker short-circuits without touching
/// the network; otherwise a matching award means fulfilled even when an
/// unrevoked denial also exists, since an issuer may award without cleaning
/// up an earlier denial; otherwise an active denial means denied.
pub async fn request_state(relays: &RelaySet, request: &BadgeRequest) -> RequestState {
    if request.withdrawn {
        return RequestState::Withdrawn;
    }
    let award_filter = Filter::kind(KIND_BADGE_AWARD)
        .author(&request.issuer)
        .tag("p", &request.requester)
        .tag("a", &request.definition.to_string())
        .limit(1);
    if !query_all(relays, &award_filter).await.is_empty() {
        return RequestState::Fulfilled;
    }
    if active_denial(relays, &request.id, &request.issuer).await.is_some() {
        return RequestState::Denied;
    }
    RequestState::Pending
}

/// The current, unrevoked denial of a request, if one exists.
///
/// The aggregator's latest-wins collapse means a revocation published at the
/// same address hides the denial it supersedes.
pub async fn active_denial(
    relays: &RelaySet,
    request_id: &str,
    issuer: &str,
) -> Option<BadgeDenial> {
    let filter = Filter::kind(KIND_BADGE_DENIAL)
        .author(issuer)
        .tag("e", request_id)
        .limit(1);
    let events = query_all(relays, &filter).await;
    let denial = events.first().and_then(BadgeDenial::from_event)?;
    (!denial.revoked).then_some(denial)
}

/// Create and publish a badge request.
pub async fn create_request(
    relays: &RelaySet,
    keys: &Keys,
    definition: &Address,
    content: &str,
    proofs: &[ProofRef],
) -> Result<Published> {
    let ev = keys.sign(request_draft(definition, content, proofs))?;
    info!(definition = %definition, "publishing badge request");
    publish_event(relays, &ev).await
}

/// Withdraw the caller's request for a definition by superseding it with a
/// withdrawn marker at the same address.
pub async fn withdraw_request(
    relays: &RelaySet,
    keys: &Keys,
    definition: &Address,
) -> Result<Published> {
    let ev = keys.sign(withdrawal_draft(definition))?;
    info!(definition = %definition, "withdrawing badge request");
    publish_event(relays, &ev).await
}

/// Deny a request with a reason.
pub async fn deny_request(
    relays: &RelaySet,
    keys: &Keys,
    request_id: &str,
    definition: &Address,
    requester: &str,
    reason: &str,
) -> Result<Published> {
    let ev = keys.sign(denial_draft(request_id, definition, requester, reason))?;
    info!(request_id, "publishing denial");
    publish_event(relays, &ev).await
}

/// Revoke a prior denial, re-opening the request.
pub async fn revoke_denial(
    relays: &RelaySet,
    keys: &Keys,
    request_id: &str,
    definition: &Address,
    requester: &str,
) -> Result<Published> {
    let ev = keys.sign(revocation_draft(request_id, definition, requester))?;
    info!(request_id, "revoking denial");
    publish_event(relays, &ev).await
}

/// Fulfill a request by awarding the badge to the requester.
pub async fn award_from_request(
    relays: &RelaySet,
    keys: &Keys,
    definition: &Address,
    requester: &str,
) -> Result<Published> {
    let recipients = [requester.to_string()];
    award_badge(relays, keys, definition, &recipients).await
}

/// A request enriched for display: badge and peer info, verified proofs,
/// derived state, and the active denial when denied.
#[derive(Debug, Clone)]
pub struct RequestView {
    /// The underlying request.
    pub request: BadgeRequest,
    /// The requested definition, when resolvable.
    pub badge: Option<BadgeDefinition>,
    /// The counterparty: issuer for outgoing views, requester for incoming.
    pub peer: Profile,
    /// Verification results for each attached proof.
    pub proofs: Vec<ProofResult>,
    /// Derived lifecycle state.
    pub state: RequestState,
    /// The active denial when `state` is denied.
    pub denial: Option<BadgeDenial>,
}

/// Requests sent by a requester, newest first, withdrawn ones omitted.
pub async fn outgoing_requests(relays: &RelaySet, requester: &str) -> Vec<RequestView> {
    let filter = Filter::kind(KIND_BADGE_REQUEST).author(requester).limit(100);
    let events = query_all(relays, &filter).await;
    let mut views = vec![];
    for request in events.iter().filter_map(BadgeRequest::from_event) {
        if request.withdrawn {
            continue;
        }
        let peer = request.issuer.clone();
        views.push(enrich(relays, request, &peer).await);
    }
    views
}

/// Requests directed at an issuer, newest first, withdrawn ones omitted.
pub async fn incoming_requests(relays: &RelaySet, issuer: &str) -> Vec<RequestView> {
    let filter = Filter::kind(KIND_BADGE_REQUEST).tag("p", issuer).limit(100);
    let events = query_all(relays, &filter).await;
    let mut views = vec![];
    for request in events.iter().filter_map(BadgeRequest::from_event) {
        if request.withdrawn {
            continue;
        }
        let peer = request.requester.clone();
        views.push(enrich(relays, request, &peer).await);
    }
    views
}

async fn enrich(relays: &RelaySet, request: BadgeRequest, peer: &str) -> RequestView {
    let badge = resolve_definition(relays, &request.definition).await;
    let peer = fetch_profile(relays, peer).await;
    let mut proofs = vec![];
    for proof in &request.proofs {
        proofs.push(verify_proof(relays, proof, &request.requester).await);
    }
    let state = request_state(relays, &request).await;
    let denial = if state == RequestState::Denied {
        active_denial(relays, &request.id, &request.issuer).await
    } else {
        None
    };
    RequestView {
        request,
        badge,
        peer,
        proofs,
        state,
        denial,
    }
}
