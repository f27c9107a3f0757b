//! Error types surfaced by the badge client.

use thiserror::Error;

/// Failures surfaced to callers of the badge operations.
///
/// Expected protocol conditions (a relay being unreachable, a proof target
/// missing) never appear here as panics or transport errors; single-relay
/// failures are absorbed by the aggregator and publisher. What remains is
/// either caller error (`InvalidAddress`, `MissingKey`) or an outcome the
/// caller must act on (`NoQuorum`, `NotFound`).
#[derive(Error, Debug)]
pub enum Error {
    /// A badge address string did not have the `kind:pubkey:identifier` shape.
    #[error("invalid badge address: {0}")]
    InvalidAddress(String),

    /// A secret key string was not a valid 32-byte hex secp256k1 key.
    #[error("invalid secret key")]
    InvalidKey,

    /// A mutating operation was requested without a configured secret key.
    #[error("no secret key configured; set SECRET_KEY to sign events")]
    MissingKey,

    /// No relay accepted a published event.
    #[error("no relay accepted the event")]
    NoQuorum,

    /// A directly queried object does not exist on any configured relay.
    #[error("not found: {0}")]
    NotFound(String),

    /// Signing produced an event that fails its own verification.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
