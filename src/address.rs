//! Replaceable-object addressing and latest-wins ordering.
//!
//! A badge definition, request, denial, or profile list is a logical object
//! identified by `(kind, author, identifier)`; the event with the greatest
//! `created_at` at that address is its current version.

use std::fmt;

use crate::error::Error;
use crate::event::{
    Event, KIND_BADGE_DEFINITION, KIND_BADGE_DENIAL, KIND_BADGE_REQUEST, KIND_PROFILE,
    KIND_PROFILE_BADGES,
};

/// Key identifying a mutable logical object.
///
/// For one-per-author kinds (profile metadata, profile badge list) the
/// identifier is empty and the address degenerates to `(kind, author)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Event kind of the object.
    pub kind: u32,
    /// Author public key (hex).
    pub author: String,
    /// Value of the `d` tag, or empty for one-per-author kinds.
    pub identifier: String,
}

impl Address {
    /// Parse a `kind:pubkey:identifier` address string as used in `a` tags.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut parts = s.splitn(3, ':');
        let (kind, author, identifier) = match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(a), Some(i)) => (k, a, i),
            _ => return Err(Error::InvalidAddress(s.to_string())),
        };
        let kind: u32 = kind
            .parse()
            .map_err(|_| Error::InvalidAddress(s.to_string()))?;
        if author.is_empty() {
            return Err(Error::InvalidAddress(s.to_string()));
        }
        Ok(Address {
            kind,
            author: author.to_string(),
            identifier: identifier.to_string(),
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.author, self.identifier)
    }
}

/// Compute the address of an event, or `None` for append-only kinds.
///
/// Parameterized kinds without their identifying `d` tag are malformed as
/// addressed objects and yield `None`; they then take no part in the
/// latest-wins collapse.
pub fn address_of(ev: &Event) -> Option<Address> {
    match ev.kind {
        KIND_PROFILE | KIND_PROFILE_BADGES => Some(Address {
            kind: ev.kind,
            author: ev.pubkey.clone(),
            identifier: String::new(),
        }),
        KIND_BADGE_DEFINITION | KIND_BADGE_REQUEST | KIND_BADGE_DENIAL => {
            ev.tag_value("d").map(|d| Address {
                kind: ev.kind,
                author: ev.pubkey.clone(),
                identifier: d.to_string(),
            })
        }
        _ => None,
    }
}

/// Whether `a` supersedes `b` at the same address (strictly newer).
///
/// Ties are unspecified; callers must not depend on which copy survives.
pub fn supersedes(a: &Event, b: &Event) -> bool {
    a.created_at > b.created_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Tag, KIND_BADGE_AWARD};

    fn event(kind: u32, pubkey: &str, tags: Vec<Tag>) -> Event {
        Event {
            id: String::new(),
            pubkey: pubkey.into(),
            kind,
            created_at: 1,
            tags,
            content: String::new(),
            sig: String::new(),
        }
    }

    #[test]
    fn parse_and_display_round_trip() {
        let s = "30009:abcd:early-adopter";
        let addr = Address::parse(s).unwrap();
        assert_eq!(addr.kind, 30009);
        assert_eq!(addr.author, "abcd");
        assert_eq!(addr.identifier, "early-adopter");
        assert_eq!(addr.to_string(), s);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Address::parse("30009:abcd").is_err());
        assert!(Address::parse("x:abcd:ident").is_err());
        assert!(Address::parse("30009::ident").is_err());
        assert!(Address::parse("").is_err());
    }

    #[test]
    fn parse_keeps_colons_in_identifier() {
        // Denial addresses embed the request address inside the identifier.
        let addr = Address::parse("30058:pk:30009:issuer:hero").unwrap();
        assert_eq!(addr.identifier, "30009:issuer:hero");
    }

    #[test]
    fn addressed_kinds_use_d_tag() {
        let ev = event(
            KIND_BADGE_DEFINITION,
            "pk",
            vec![Tag::new(["d", "hero"])],
        );
        let addr = address_of(&ev).unwrap();
        assert_eq!(addr.identifier, "hero");
        assert_eq!(addr.author, "pk");
    }

    #[test]
    fn addressed_kind_without_d_has_no_address() {
        let ev = event(KIND_BADGE_DEFINITION, "pk", vec![]);
        assert!(address_of(&ev).is_none());
    }

    #[test]
    fn one_per_author_kinds_ignore_identifier() {
        let with_d = event(
            KIND_PROFILE_BADGES,
            "pk",
            vec![Tag::new(["d", "profile_badges"])],
        );
        let without_d = event(KIND_PROFILE_BADGES, "pk", vec![]);
        assert_eq!(address_of(&with_d), address_of(&without_d));
    }

    #[test]
    fn append_only_kinds_have_no_address() {
        let ev = event(KIND_BADGE_AWARD, "pk", vec![Tag::new(["d", "x"])]);
        assert!(address_of(&ev).is_none());
    }

    #[test]
    fn supersedes_is_strict() {
        let mut older = event(KIND_BADGE_DEFINITION, "pk", vec![]);
        let mut newer = older.clone();
        older.created_at = 100;
        newer.created_at = 200;
        assert!(supersedes(&newer, &older));
        assert!(!supersedes(&older, &newer));
        assert!(!supersedes(&older, &older));
    }
}
