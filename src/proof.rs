//! Verification of evidence attached to badge requests.
//!
//! Proofs are never stored; they are re-resolved from the relays on every
//! read, so re-running a verification is always safe.

use crate::aggregate::query_all;
use crate::event::{Event, KIND_NOTE, KIND_ZAP_RECEIPT};
use crate::model::{ProofKind, ProofRef};
use crate::profile::{fetch_profile, Profile};
use crate::relay::{Filter, RelaySet};

/// Maximum note content surfaced on a verified proof.
const NOTE_PREVIEW_CHARS: usize = 500;

/// Outcome of checking one proof reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofStatus {
    /// The referenced event exists and matches the claim.
    Verified,
    /// The referenced event was not found on any relay.
    NotFound,
    /// A note proof was authored by someone other than the requester.
    AuthorMismatch,
    /// A zap receipt names a recipient other than the requester.
    RecipientMismatch,
    /// The declared proof kind is not one this client understands.
    Unsupported,
}

/// Result of verifying one proof reference against a claimed author.
#[derive(Debug, Clone)]
pub struct ProofResult {
    /// The referenced event id.
    pub event_id: String,
    /// Declared proof kind.
    pub kind: ProofKind,
    /// Verification outcome.
    pub status: ProofStatus,
    /// Truncated note content, for note proofs.
    pub content: Option<String>,
    /// Timestamp of the referenced event.
    pub created_at: Option<u64>,
    /// Payment amount in satoshis, when the receipt's invoice parses.
    pub amount_sats: Option<u64>,
    /// Zap sender identity, resolved best-effort.
    pub sender: Option<Profile>,
}

impl ProofResult {
    /// Whether the proof checks out.
    pub fn verified(&self) -> bool {
        self.status == ProofStatus::Verified
    }

    fn with_status(proof: &ProofRef, status: ProofStatus) -> Self {
        ProofResult {
            event_id: proof.event_id.clone(),
            kind: proof.kind.clone(),
            status,
            content: None,
            created_at: None,
            amount_sats: None,
            sender: None,
        }
    }
}

/// Verify one proof reference against the requester claiming it.
pub async fn verify_proof(relays: &RelaySet, proof: &ProofRef, claimed: &str) -> ProofResult {
    match proof.kind {
        ProofKind::Note => verify_note(relays, proof, claimed).await,
        ProofKind::Zap => verify_zap(relays, proof, claimed).await,
        ProofKind::Other(_) => ProofResult::with_status(proof, ProofStatus::Unsupported),
    }
}

/// Fetch a referenced event by id, restricted to the expected kind.
async fn fetch_by_id(relays: &RelaySet, id: &str, kind: u32) -> Option<Event> {
    let filter = Filter::kind(kind).id(id).limit(1);
    query_all(relays, &filter).await.into_iter().next()
}

async fn verify_note(relays: &RelaySet, proof: &ProofRef, claimed: &str) -> ProofResult {
    let Some(note) = fetch_by_id(relays, &proof.event_id, KIND_NOTE).await else {
        return ProofResult::with_status(proof, ProofStatus::NotFound);
    };
    if note.pubkey != claimed {
        return ProofResult::with_status(proof, ProofStatus::AuthorMismatch);
    }
    let preview: String = note.content.chars().take(NOTE_PREVIEW_CHARS).collect();
    ProofResult {
        content: Some(preview),
        created_at: Some(note.created_at),
        ..ProofResult::with_status(proof, ProofStatus::Verified)
    }
}

async fn verify_zap(relays: &RelaySet, proof: &ProofRef, claimed: &str) -> ProofResult {
    let Some(zap) = fetch_by_id(relays, &proof.event_id, KIND_ZAP_RECEIPT).await else {
        return ProofResult::with_status(proof, ProofStatus::NotFound);
    };
    if zap.tag_value("p") != Some(claimed) {
        return ProofResult::with_status(proof, ProofStatus::RecipientMismatch);
    }
    let amount_sats = zap.tag_value("bolt11").and_then(bolt11_amount);
    let sender = fetch_profile(relays, &zap.pubkey).await;
    ProofResult {
        created_at: Some(zap.created_at),
        amount_sats,
        sender: Some(sender),
        ..ProofResult::with_status(proof, ProofStatus::Verified)
    }
}

/// Extract the amount in satoshis from a bolt11 invoice string.
///
/// Reads the digits following the `lnbc` prefix and applies the magnitude
/// suffix: `m` = ×100 000, `u` = ×100, `n` = ÷10, `p` = ÷10 000 sats. An
/// invoice that does not parse yields `None`; the proof as a whole still
/// verifies.
pub fn bolt11_amount(invoice: &str) -> Option<u64> {
    let rest = invoice.to_lowercase();
    let rest = rest.strip_prefix("lnbc")?;
    let mut digits = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return None;
        }
        let amount: u64 = digits.parse().ok()?;
        return Some(match c {
            'm' => amount * 100_000,
            'u' => amount * 100,
            'n' => amount / 10,
            'p' => amount / 10_000,
            _ => amount,
        });
    }
    None
}
