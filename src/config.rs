//! Configuration loading from `.env` files.

use std::{env, time::Duration};

use anyhow::{bail, Context, Result};

use crate::error::Error;
use crate::relay::RelaySet;
use crate::signer::Keys;

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Relay URLs queried and published to, in order.
    pub relays: Vec<String>,
    /// Optional Tor SOCKS proxy (host:port).
    pub tor_socks: Option<String>,
    /// Per-relay deadline in seconds for every query and publish.
    pub query_timeout_secs: u64,
    /// Optional hex secret key; required only for mutating operations.
    pub secret_key: Option<String>,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let relays = csv_strings(env::var("RELAYS").unwrap_or_default());
        if relays.is_empty() {
            bail!("RELAYS must list at least one relay URL");
        }
        let tor_socks = env::var("TOR_SOCKS").ok().filter(|s| !s.is_empty());
        let query_timeout_secs = env::var("QUERY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(7);
        let secret_key = env::var("SECRET_KEY").ok().filter(|s| !s.is_empty());
        Ok(Self {
            relays,
            tor_socks,
            query_timeout_secs,
            secret_key,
        })
    }

    /// The relay set carrying the single per-relay deadline.
    pub fn relay_set(&self) -> RelaySet {
        RelaySet {
            urls: self.relays.clone(),
            socks: self.tor_socks.clone(),
            timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }

    /// Signing keys for mutating operations.
    pub fn keys(&self) -> std::result::Result<Keys, Error> {
        let secret = self.secret_key.as_deref().ok_or(Error::MissingKey)?;
        Keys::from_secret_hex(secret)
    }
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    let s = input.as_ref();
    s.split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect()
}
