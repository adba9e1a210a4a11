//! Process-wide shared secret
//!
//! The shared secret is the passphrase every node uses to derive token keys.
//! It is loaded once at startup and shared by reference afterwards. The bytes
//! are zeroized when the last handle is dropped and never appear in `Debug`.

use crate::{CodecError, Result};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Environment variable consulted when no other name is configured
pub const DEFAULT_SECRET_ENV: &str = "ENCRYPTION_SECRET";

/// Shared passphrase used as key-derivation input
#[derive(Clone)]
pub struct SharedSecret(Arc<Zeroizing<Vec<u8>>>);

impl SharedSecret {
    /// Wrap secret bytes. Empty secrets are rejected.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(CodecError::invalid_input("shared secret must not be empty"));
        }
        Ok(Self(Arc::new(secret)))
    }

    /// Load the secret from an environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let value = std::env::var(var).map_err(|e| {
            CodecError::invalid_input(format!("cannot read shared secret from {var}: {e}"))
        })?;
        let secret = Self::new(value.into_bytes())?;
        tracing::debug!(source = var, "loaded shared secret from environment");
        Ok(secret)
    }

    /// Raw secret bytes, for key derivation only
    pub fn expose_secret(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}
