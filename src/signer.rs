//! Event signing with a locally held secp256k1 key.
//!
//! Secret material lives only inside [`Keys`] for the lifetime of the
//! process; nothing here writes it to disk.

use std::time::{SystemTime, UNIX_EPOCH};

use secp256k1::{Keypair, Message, Secp256k1};

use crate::error::{Error, Result};
use crate::event::{event_hash, verify_event, Event, Tag};

/// Unsigned event fields; [`Keys::sign`] fills in author, timestamp, id and
/// signature.
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// Kind number of the event to produce.
    pub kind: u32,
    /// Tags in emission order.
    pub tags: Vec<Tag>,
    /// Content body.
    pub content: String,
}

/// Signing identity derived from a 32-byte hex secret key.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
    /// Hex-encoded x-only public key.
    pub pubkey: String,
}

impl Keys {
    /// Build a signing identity from a hex secret key.
    pub fn from_secret_hex(secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim()).map_err(|_| Error::InvalidKey)?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, &bytes).map_err(|_| Error::InvalidKey)?;
        let pubkey = hex::encode(keypair.x_only_public_key().0.serialize());
        Ok(Keys { keypair, pubkey })
    }

    /// Sign a draft, producing a complete event timestamped now.
    ///
    /// The signed event is re-verified before being returned; a signature
    /// that does not validate aborts this one call with [`Error::Signing`].
    pub fn sign(&self, draft: EventDraft) -> Result<Event> {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::Signing(e.to_string()))?
            .as_secs();
        let mut ev = Event {
            id: String::new(),
            pubkey: self.pubkey.clone(),
            kind: draft.kind,
            created_at,
            tags: draft.tags,
            content: draft.content,
            sig: String::new(),
        };
        let hash = event_hash(&ev).map_err(|e| Error::Signing(e.to_string()))?;
        ev.id = hex::encode(hash);
        let msg = Message::from_digest_slice(&hash).map_err(|e| Error::Signing(e.to_string()))?;
        let secp = Secp256k1::new();
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        ev.sig = hex::encode(sig.as_ref());
        verify_event(&ev).map_err(|e| Error::Signing(e.to_string()))?;
        Ok(ev)
    }
}
