//! Nostr event model and integrity checks.

use anyhow::{anyhow, Result};
use secp256k1::{schnorr::Signature, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Badge definition (parameterized replaceable).
pub const KIND_BADGE_DEFINITION: u32 = 30009;
/// Badge award (append-only).
pub const KIND_BADGE_AWARD: u32 = 8;
/// Profile badges list, one per owner.
pub const KIND_PROFILE_BADGES: u32 = 30008;
/// Badge request (parameterized replaceable, one per requester/definition).
pub const KIND_BADGE_REQUEST: u32 = 30058;
/// Badge denial (parameterized replaceable, one per request).
pub const KIND_BADGE_DENIAL: u32 = 30059;
/// Plain text note, usable as an authorship proof.
pub const KIND_NOTE: u32 = 1;
/// Zap receipt, usable as a payment proof.
pub const KIND_ZAP_RECEIPT: u32 = 9735;
/// Profile metadata, one per author.
pub const KIND_PROFILE: u32 = 0;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// The first element denotes the type and the rest hold data. Tags this
/// client interprets:
///
/// - `d` – identifier for replaceable events
/// - `a` – badge definition address `kind:pubkey:identifier`
/// - `e` – another event's ID
/// - `p` – another author's public key
/// - `proof` – evidence reference on a badge request
/// - `status` – `withdrawn` / `revoked` marker
///
/// Each tag is stored verbatim so uncommon or custom tags are preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

impl Tag {
    /// Build a tag from string-ish parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tag(parts.into_iter().map(Into::into).collect())
    }
}

/// Core Nostr event exchanged with relays.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "deadbeef",
///   "kind": 30009,
///   "created_at": 1700000000,
///   "tags": [["d", "helper"], ["name", "Helper"]],
///   "content": "",
///   "sig": "deadbeef"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex, x-only).
    pub pubkey: String,
    /// Kind number, e.g. `8` or `30009`.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Arbitrary tags such as `d` (identifier) or `p` (recipient).
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

impl Event {
    /// First value of the first tag named `name`, if any.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags.iter().find_map(|Tag(fields)| match fields.as_slice() {
            [t, val, ..] if t == name => Some(val.as_str()),
            _ => None,
        })
    }

    /// All values of tags named `name`, in emission order.
    pub fn tag_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.tags.iter().filter_map(move |Tag(fields)| match fields.as_slice() {
            [t, val, ..] if t == name => Some(val.as_str()),
            _ => None,
        })
    }

    /// Whether a `["status", marker]` tag is present.
    pub fn has_status(&self, marker: &str) -> bool {
        self.tag_values("status").any(|v| v == marker)
    }
}

/// Recompute the Nostr event hash from its fields.
pub fn event_hash(ev: &Event) -> Result<[u8; 32]> {
    let arr = serde_json::json!([0, ev.pubkey, ev.created_at, ev.kind, ev.tags, ev.content]);
    let data = serde_json::to_vec(&arr)?;
    let hash = Sha256::digest(&data);
    Ok(hash.into())
}

/// Verify an event's ID and Schnorr signature.
///
/// Events failing this check are treated as malformed and dropped by the
/// transport; the error is only inspected by tests and logging.
pub fn verify_event(ev: &Event) -> Result<()> {
    let hash = event_hash(ev)?;
    let calc_id = hex::encode(hash);
    if calc_id != ev.id {
        return Err(anyhow!("id mismatch"));
    }
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    let pk = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest_slice(&hash)?;
    secp.verify_schnorr(&sig, &msg, &pk)?;
    Ok(())
}
