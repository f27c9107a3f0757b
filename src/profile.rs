//! Best-effort profile metadata lookup (kind 0).

use crate::aggregate::query_all;
use crate::event::KIND_PROFILE;
use crate::relay::{Filter, RelaySet};

/// Display info for a public key, with placeholder defaults when no
/// metadata event is found anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// The profile's public key (hex).
    pub pubkey: String,
    /// `name`, falling back to `display_name`, falling back to a placeholder.
    pub name: String,
    /// Avatar URL, empty when unset.
    pub picture: String,
}

impl Profile {
    fn unknown(pubkey: &str) -> Self {
        Profile {
            pubkey: pubkey.to_string(),
            name: "(no name)".into(),
            picture: String::new(),
        }
    }
}

/// Fetch the current metadata for a pubkey across all relays.
///
/// The aggregator's latest-wins collapse picks the newest kind-0 event;
/// unparsable metadata degrades to the placeholder profile.
pub async fn fetch_profile(relays: &RelaySet, pubkey: &str) -> Profile {
    let filter = Filter::kind(KIND_PROFILE).author(pubkey).limit(1);
    let events = query_all(relays, &filter).await;
    let mut profile = Profile::unknown(pubkey);
    if let Some(ev) = events.first() {
        if let Ok(meta) = serde_json::from_str::<serde_json::Value>(&ev.content) {
            let name = meta
                .get("name")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .or_else(|| meta.get("display_name").and_then(|v| v.as_str()));
            if let Some(name) = name {
                profile.name = name.to_string();
            }
            if let Some(picture) = meta.get("picture").and_then(|v| v.as_str()) {
                profile.picture = picture.to_string();
            }
        }
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{relay_set, signed_event, test_pubkey, MockRelay};

    #[tokio::test]
    async fn fetches_name_and_picture() {
        let meta = signed_event(
            4,
            KIND_PROFILE,
            100,
            vec![],
            r#"{"name":"alice","picture":"https://x/a.png"}"#,
        );
        let relay = MockRelay::spawn(vec![meta]).await;
        let set = relay_set(&[&relay]);

        let profile = fetch_profile(&set, &test_pubkey(4)).await;
        assert_eq!(profile.name, "alice");
        assert_eq!(profile.picture, "https://x/a.png");
    }

    #[tokio::test]
    async fn display_name_is_a_fallback() {
        let meta = signed_event(4, KIND_PROFILE, 100, vec![], r#"{"display_name":"Alice B"}"#);
        let relay = MockRelay::spawn(vec![meta]).await;
        let set = relay_set(&[&relay]);

        let profile = fetch_profile(&set, &test_pubkey(4)).await;
        assert_eq!(profile.name, "Alice B");
    }

    #[tokio::test]
    async fn newest_metadata_wins() {
        let old = signed_event(4, KIND_PROFILE, 100, vec![], r#"{"name":"old"}"#);
        let new = signed_event(4, KIND_PROFILE, 200, vec![], r#"{"name":"new"}"#);
        let relay_a = MockRelay::spawn(vec![old]).await;
        let relay_b = MockRelay::spawn(vec![new]).await;
        let set = relay_set(&[&relay_a, &relay_b]);

        let profile = fetch_profile(&set, &test_pubkey(4)).await;
        assert_eq!(profile.name, "new");
    }

    #[tokio::test]
    async fn malformed_or_missing_metadata_degrades() {
        let broken = signed_event(4, KIND_PROFILE, 100, vec![], "not json");
        let relay = MockRelay::spawn(vec![broken]).await;
        let set = relay_set(&[&relay]);

        let profile = fetch_profile(&set, &test_pubkey(4)).await;
        assert_eq!(profile.name, "(no name)");
        assert_eq!(profile.picture, "");

        let empty = MockRelay::spawn(vec![]).await;
        let set = relay_set(&[&empty]);
        let profile = fetch_profile(&set, &test_pubkey(4)).await;
        assert_eq!(profile.name, "(no name)");
    }
}
