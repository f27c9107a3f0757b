//! Typed badge objects decoded from raw events.
//!
//! Raw tag arrays stop here: everything above this layer works with these
//! structs. Decoding is lenient in the protocol's spirit — an event that
//! lacks the tags a type needs simply yields `None`.

use crate::address::{address_of, Address};
use crate::event::{
    Event, Tag, KIND_BADGE_AWARD, KIND_BADGE_DEFINITION, KIND_BADGE_DENIAL, KIND_BADGE_REQUEST,
    KIND_PROFILE_BADGES,
};
use crate::signer::EventDraft;

/// Identifier used in the `d` tag of every profile badge list.
pub const PROFILE_BADGES_D: &str = "profile_badges";

/// A badge definition (kind 30009), latest version wins.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeDefinition {
    /// Address of the definition.
    pub address: Address,
    /// Display name, falling back to the identifier.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Image URL; `thumb` is used when `image` is absent.
    pub image: String,
    /// Timestamp of the current version.
    pub created_at: u64,
}

impl BadgeDefinition {
    /// Decode a definition from its event.
    pub fn from_event(ev: &Event) -> Option<Self> {
        if ev.kind != KIND_BADGE_DEFINITION {
            return None;
        }
        let address = address_of(ev)?;
        let name = ev
            .tag_value("name")
            .unwrap_or(&address.identifier)
            .to_string();
        let description = ev.tag_value("description").unwrap_or_default().to_string();
        let image = ev
            .tag_value("image")
            .or_else(|| ev.tag_value("thumb"))
            .unwrap_or_default()
            .to_string();
        Some(BadgeDefinition {
            name,
            description,
            image,
            created_at: ev.created_at,
            address,
        })
    }
}

/// Draft for a new or updated badge definition.
pub fn definition_draft(identifier: &str, name: &str, description: &str, image: &str) -> EventDraft {
    EventDraft {
        kind: KIND_BADGE_DEFINITION,
        tags: vec![
            Tag::new(["d", identifier]),
            Tag::new(["name", name]),
            Tag::new(["description", description]),
            Tag::new(["image", image]),
        ],
        content: format!("Badge definition: {name}"),
    }
}

/// A badge award (kind 8); append-only, each event is a distinct grant.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeAward {
    /// Award event id.
    pub id: String,
    /// Issuer public key (the award author).
    pub issuer: String,
    /// Address of the awarded definition.
    pub definition: Address,
    /// Recipient public keys (`p` tags).
    pub recipients: Vec<String>,
    /// Timestamp of the award.
    pub created_at: u64,
}

impl BadgeAward {
    /// Decode an award from its event.
    pub fn from_event(ev: &Event) -> Option<Self> {
        if ev.kind != KIND_BADGE_AWARD {
            return None;
        }
        let definition = Address::parse(ev.tag_value("a")?).ok()?;
        Some(BadgeAward {
            id: ev.id.clone(),
            issuer: ev.pubkey.clone(),
            definition,
            recipients: ev.tag_values("p").map(str::to_string).collect(),
            created_at: ev.created_at,
        })
    }
}

/// Draft for awarding a definition to a set of recipients.
pub fn award_draft(definition: &Address, recipients: &[String]) -> EventDraft {
    let mut tags = vec![Tag::new(["a", definition.to_string().as_str()])];
    for r in recipients {
        tags.push(Tag::new(["p", r.as_str()]));
    }
    EventDraft {
        kind: KIND_BADGE_AWARD,
        tags,
        content: String::new(),
    }
}

/// The profile badge list (kind 30008): the owner's accepted badges as
/// ordered (definition address, award event id) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileBadgeList {
    /// List owner public key.
    pub owner: String,
    /// Accepted (definition, award id) pairs in display order.
    pub pairs: Vec<(Address, String)>,
    /// Timestamp of the current list version, 0 when absent.
    pub created_at: u64,
}

impl ProfileBadgeList {
    /// Empty list for an owner with no published list event.
    pub fn empty(owner: &str) -> Self {
        ProfileBadgeList {
            owner: owner.to_string(),
            ..Default::default()
        }
    }

    /// Decode the list from its event.
    ///
    /// Pairs are read as adjacent (`a`, `e`) couples in emission order; an
    /// `a` tag not immediately paired with an `e` tag is dropped, as is an
    /// `e` tag with no preceding `a`.
    pub fn from_event(ev: &Event) -> Option<Self> {
        if ev.kind != KIND_PROFILE_BADGES {
            return None;
        }
        let mut pairs = vec![];
        let mut last_a: Option<Address> = None;
        for Tag(fields) in &ev.tags {
            match fields.as_slice() {
                [t, val, ..] if t == "a" => {
                    last_a = Address::parse(val).ok();
                }
                [t, val, ..] if t == "e" => {
                    if let Some(addr) = last_a.take() {
                        pairs.push((addr, val.clone()));
                    }
                }
                _ => {}
            }
        }
        Some(ProfileBadgeList {
            owner: ev.pubkey.clone(),
            pairs,
            created_at: ev.created_at,
        })
    }

    /// Whether the exact (definition, award) pair is already accepted.
    pub fn contains(&self, definition: &Address, award_id: &str) -> bool {
        self.pairs
            .iter()
            .any(|(a, e)| a == definition && e == award_id)
    }

    /// Whether any award of the given definition is accepted.
    pub fn contains_definition(&self, definition: &Address) -> bool {
        self.pairs.iter().any(|(a, _)| a == definition)
    }

    /// Draft for republishing the full list. There is no partial append at
    /// the protocol level; the whole list is replaced on every change.
    pub fn to_draft(&self) -> EventDraft {
        let mut tags = vec![Tag::new(["d", PROFILE_BADGES_D])];
        for (addr, award_id) in &self.pairs {
            tags.push(Tag::new(["a", addr.to_string().as_str()]));
            tags.push(Tag::new(["e", award_id.as_str()]));
        }
        EventDraft {
            kind: KIND_PROFILE_BADGES,
            tags,
            content: String::new(),
        }
    }
}

/// Declared kind of a proof reference on a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofKind {
    /// A note (kind 1) authored by the requester.
    Note,
    /// A zap receipt (kind 9735) paid to the requester.
    Zap,
    /// Anything else; verification reports it as unsupported.
    Other(String),
}

impl ProofKind {
    /// Parse a proof kind label, defaulting to `note` when absent.
    pub fn parse(label: Option<&str>) -> Self {
        match label {
            None | Some("note") => ProofKind::Note,
            Some("zap") => ProofKind::Zap,
            Some(other) => ProofKind::Other(other.to_string()),
        }
    }

    /// Wire label for the proof tag.
    pub fn label(&self) -> &str {
        match self {
            ProofKind::Note => "note",
            ProofKind::Zap => "zap",
            ProofKind::Other(s) => s,
        }
    }
}

/// Pointer to an external event offered as evidence on a request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProofRef {
    /// Referenced event id.
    pub event_id: String,
    /// Declared proof kind.
    pub kind: ProofKind,
}

/// A badge request (kind 30058); one active request per
/// (requester, definition), newer versions replace older ones.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeRequest {
    /// Request event id.
    pub id: String,
    /// Requester public key.
    pub requester: String,
    /// Address of the requested definition.
    pub definition: Address,
    /// Issuer public key the request is directed at.
    pub issuer: String,
    /// Free-text motivation.
    pub content: String,
    /// Evidence references.
    pub proofs: Vec<ProofRef>,
    /// Terminal withdrawn marker.
    pub withdrawn: bool,
    /// Timestamp of the current version.
    pub created_at: u64,
}

impl BadgeRequest {
    /// Decode a request from its event.
    pub fn from_event(ev: &Event) -> Option<Self> {
        if ev.kind != KIND_BADGE_REQUEST {
            return None;
        }
        let definition = Address::parse(ev.tag_value("a")?).ok()?;
        let issuer = ev
            .tag_value("p")
            .map(str::to_string)
            .unwrap_or_else(|| definition.author.clone());
        let proofs = ev
            .tags
            .iter()
            .filter_map(|Tag(fields)| match fields.as_slice() {
                [t, id, rest @ ..] if t == "proof" => Some(ProofRef {
                    event_id: id.clone(),
                    kind: ProofKind::parse(rest.first().map(String::as_str)),
                }),
                _ => None,
            })
            .collect();
        Some(BadgeRequest {
            id: ev.id.clone(),
            requester: ev.pubkey.clone(),
            definition,
            issuer,
            content: ev.content.clone(),
            proofs,
            withdrawn: ev.has_status("withdrawn"),
            created_at: ev.created_at,
        })
    }
}

/// Draft for a new badge request.
pub fn request_draft(definition: &Address, content: &str, proofs: &[ProofRef]) -> EventDraft {
    let a_tag = definition.to_string();
    let mut tags = vec![
        Tag::new(["d", a_tag.as_str()]),
        Tag::new(["a", a_tag.as_str()]),
        Tag::new(["p", definition.author.as_str()]),
    ];
    for p in proofs {
        tags.push(Tag::new(["proof", p.event_id.as_str(), p.kind.label()]));
    }
    EventDraft {
        kind: KIND_BADGE_REQUEST,
        tags,
        content: content.to_string(),
    }
}

/// Draft for withdrawing a request: same address, withdrawn marker, no
/// content. Publishing it supersedes the active request.
pub fn withdrawal_draft(definition: &Address) -> EventDraft {
    let a_tag = definition.to_string();
    EventDraft {
        kind: KIND_BADGE_REQUEST,
        tags: vec![
            Tag::new(["d", a_tag.as_str()]),
            Tag::new(["a", a_tag.as_str()]),
            Tag::new(["p", definition.author.as_str()]),
            Tag::new(["status", "withdrawn"]),
        ],
        content: String::new(),
    }
}

/// A badge denial (kind 30059); one active denial per request, revocable by
/// republishing with a `revoked` marker.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeDenial {
    /// Denial event id.
    pub id: String,
    /// Issuer public key (the denial author).
    pub issuer: String,
    /// Id of the denied request event.
    pub request_id: String,
    /// Free-text reason, empty on revocations.
    pub reason: String,
    /// Whether this denial has been revoked.
    pub revoked: bool,
    /// Timestamp of the current version.
    pub created_at: u64,
}

impl BadgeDenial {
    /// Decode a denial from its event.
    pub fn from_event(ev: &Event) -> Option<Self> {
        if ev.kind != KIND_BADGE_DENIAL {
            return None;
        }
        let request_id = ev
            .tag_value("e")
            .or_else(|| ev.tag_value("d"))?
            .to_string();
        Some(BadgeDenial {
            id: ev.id.clone(),
            issuer: ev.pubkey.clone(),
            request_id,
            reason: ev.content.clone(),
            revoked: ev.has_status("revoked"),
            created_at: ev.created_at,
        })
    }
}

/// Draft for denying a request.
pub fn denial_draft(
    request_id: &str,
    definition: &Address,
    requester: &str,
    reason: &str,
) -> EventDraft {
    EventDraft {
        kind: KIND_BADGE_DENIAL,
        tags: vec![
            Tag::new(["d", request_id]),
            Tag::new(["a", definition.to_string().as_str()]),
            Tag::new(["e", request_id]),
            Tag::new(["p", requester]),
        ],
        content: reason.to_string(),
    }
}

/// Draft for revoking a denial: same address, revoked marker, no reason.
pub fn revocation_draft(request_id: &str, definition: &Address, requester: &str) -> EventDraft {
    EventDraft {
        kind: KIND_BADGE_DENIAL,
        tags: vec![
            Tag::new(["d", request_id]),
            Tag::new(["a", definition.to_string().as_str()]),
            Tag::new(["e", request_id]),
            Tag::new(["p", requester]),
            Tag::new(["status", "revoked"]),
        ],
        content: String::new(),
    }
}
