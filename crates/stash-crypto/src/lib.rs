//! Stash Crypto: capability token sealing
//!
//! Turns a stash signing key, a stash id and a dweller id into an opaque token
//! that only holders of the shared secret can open.
//!
//! ## Core Components
//!
//! - **Key Derivation**: PBKDF2-HMAC-SHA256 over the shared secret and a per-token salt
//! - **Capability Codec**: AES-256-CBC sealing with an HMAC-SHA256 tag, base-64 transport form
//! - **Shared Secret**: process-wide passphrase, zeroized and redacted
//! - **Configuration**: work factor and secret source
//!
//! All operations are pure apart from drawing randomness, and safe to call
//! concurrently.

#![forbid(unsafe_code)]

/// Capability token encoding and decoding
pub mod codec;
/// Codec configuration
pub mod config;
/// Codec error types
pub mod error;
/// Password-based key derivation
pub mod key_derivation;
/// Shared secret handling
pub mod secret;

pub use codec::{constant_time_eq, CapabilityClaims, CapabilityCodec, DELIMITER};
pub use config::CodecConfig;
pub use error::{CodecError, Result};
pub use key_derivation::{
    derive_key, DerivedKey, KdfParams, DEFAULT_ITERATIONS, KEY_LEN, MIN_ITERATIONS, MIN_SALT_LEN,
};
pub use secret::{SharedSecret, DEFAULT_SECRET_ENV};
