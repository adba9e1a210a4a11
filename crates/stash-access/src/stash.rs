//! Stashes and dwellers as seen by the access core
//!
//! Both are owned by an external system; the core only reads the identifiers
//! and the stash signing key.

use crate::identifiers::{DwellerId, StashId};
use crate::{AccessError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use stash_crypto::{constant_time_eq, DELIMITER};
use std::fmt;
use zeroize::Zeroizing;

/// Per-stash secret held by the creator
///
/// Embedded in every capability token for the stash and never shown to
/// dwellers. Zeroized on drop and redacted in `Debug`.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<String>);

impl SigningKey {
    /// Wrap an existing signing key
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = Zeroizing::new(value.into());
        if value.is_empty() {
            return Err(AccessError::invalid_input("signing key must not be empty"));
        }
        if value.contains(DELIMITER) {
            return Err(AccessError::invalid_input(format!(
                "signing key must not contain '{DELIMITER}'"
            )));
        }
        Ok(Self(value))
    }

    /// Generate a random 256-bit signing key
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        Self(Zeroizing::new(URL_SAFE_NO_PAD.encode(&bytes[..])))
    }

    /// Secret key text, for sealing tokens only
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a candidate key
    pub fn matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.0.as_bytes(), candidate.as_bytes())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// A protected resource owned by a creator
#[derive(Debug, Clone)]
pub struct Stash {
    /// Stash identifier
    pub id: StashId,
    /// Secret embedded in capability tokens for this stash
    pub signing_key: SigningKey,
}

impl Stash {
    /// Create a stash view
    pub fn new(id: StashId, signing_key: SigningKey) -> Self {
        Self { id, signing_key }
    }
}

/// A user granted access to stashes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dweller {
    /// Dweller identifier
    pub id: DwellerId,
}

impl Dweller {
    /// Create a dweller view
    pub fn new(id: DwellerId) -> Self {
        Self { id }
    }
}
