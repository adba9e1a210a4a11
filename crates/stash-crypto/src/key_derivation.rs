//! Password-based key derivation for capability tokens
//!
//! Every token carries its own random salt. The shared secret and that salt are
//! stretched with PBKDF2-HMAC-SHA256 into a 32-byte AES-256 key. The iteration
//! count is an explicit parameter so deployments can raise it as hardware gets
//! faster; tokens must be decoded with the same count they were encoded with.

use crate::{CodecError, Result};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

/// Length of derived key material in bytes
pub const KEY_LEN: usize = 32;

/// Shortest salt accepted by [`derive_key`]
pub const MIN_SALT_LEN: usize = 16;

/// Lowest accepted PBKDF2 work factor
pub const MIN_ITERATIONS: u32 = 100_000;

/// Work factor used when none is configured
pub const DEFAULT_ITERATIONS: u32 = MIN_ITERATIONS;

/// PBKDF2 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 rounds
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// Create parameters with an explicit iteration count
    pub fn new(iterations: u32) -> Result<Self> {
        let params = Self { iterations };
        params.validate()?;
        Ok(params)
    }

    /// Reject work factors below [`MIN_ITERATIONS`]
    pub fn validate(&self) -> Result<()> {
        if self.iterations < MIN_ITERATIONS {
            return Err(CodecError::invalid_input(format!(
                "PBKDF2 iterations must be at least {MIN_ITERATIONS}, got {}",
                self.iterations
            )));
        }
        Ok(())
    }
}

/// Symmetric key derived for a single encode or decode call
///
/// Zeroized on drop.
pub struct DerivedKey(Zeroizing<[u8; KEY_LEN]>);

impl DerivedKey {
    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derive a 32-byte key from the shared secret and a salt
///
/// Deterministic in `(secret, salt, params)`. Fails with
/// [`CodecError::InvalidInput`] when the secret is empty, the salt is shorter
/// than [`MIN_SALT_LEN`] bytes, or the work factor is below [`MIN_ITERATIONS`].
pub fn derive_key(secret: &[u8], salt: &[u8], params: &KdfParams) -> Result<DerivedKey> {
    if secret.is_empty() {
        return Err(CodecError::invalid_input("shared secret must not be empty"));
    }
    if salt.len() < MIN_SALT_LEN {
        return Err(CodecError::invalid_input(format!(
            "salt must be at least {MIN_SALT_LEN} bytes, got {}",
            salt.len()
        )));
    }
    params.validate()?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    stretch(secret, salt, params.iterations, &mut key[..]);
    Ok(DerivedKey(key))
}

fn stretch(secret: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) {
    pbkdf2_hmac::<Sha256>(secret, salt, iterations, out);
}
