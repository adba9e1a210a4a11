//! Capability token codec
//!
//! A token binds a stash signing key, a stash id and a dweller id under the
//! shared secret. Layout before base-64 encoding:
//!
//! ```text
//! IV (16) || salt (16) || AES-256-CBC ciphertext (16·n) || HMAC-SHA256 tag (32)
//! ```
//!
//! Salt and IV are drawn fresh for every token. The AES key is derived from the
//! shared secret and the salt; the tag key is expanded from that AES key with
//! HKDF so both are bound to the same salt. The tag covers everything before it
//! and is checked before decryption, so tampered tokens never reach the padding
//! check. Every decoding failure is reported as [`CodecError::MalformedToken`].

use crate::key_derivation::{derive_key, DerivedKey, KdfParams, KEY_LEN, MIN_SALT_LEN};
use crate::{CodecError, Result, SharedSecret};
use aes::Aes256;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Separator between the three plaintext fields
pub const DELIMITER: char = ':';

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Initialization vector length (one AES block)
pub const IV_LEN: usize = BLOCK_SIZE;

/// Salt length carried in every token
pub const SALT_LEN: usize = MIN_SALT_LEN;

/// Authentication tag length
pub const TAG_LEN: usize = 32;

const HEADER_LEN: usize = IV_LEN + SALT_LEN;
const MIN_TOKEN_LEN: usize = HEADER_LEN + BLOCK_SIZE + TAG_LEN;
const MAC_INFO: &[u8] = b"stash:capability:mac:v1";

/// Compare two byte strings without early exit on the first difference
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// The three fields recovered from a decoded token
///
/// The signing key is zeroized on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CapabilityClaims {
    signing_key: String,
    stash_id: String,
    dweller_id: String,
}

impl CapabilityClaims {
    /// Signing key of the stash the token was issued for
    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }

    /// Identifier of the stash the token grants access to
    pub fn stash_id(&self) -> &str {
        &self.stash_id
    }

    /// Identifier of the dweller the token was issued to
    pub fn dweller_id(&self) -> &str {
        &self.dweller_id
    }

    /// Check all three fields against expected values
    ///
    /// Every field is compared in constant time and all three comparisons run
    /// regardless of earlier mismatches.
    pub fn matches(&self, signing_key: &str, stash_id: &str, dweller_id: &str) -> bool {
        let key_ok = constant_time_eq(self.signing_key.as_bytes(), signing_key.as_bytes());
        let stash_ok = constant_time_eq(self.stash_id.as_bytes(), stash_id.as_bytes());
        let dweller_ok = constant_time_eq(self.dweller_id.as_bytes(), dweller_id.as_bytes());
        key_ok & stash_ok & dweller_ok
    }
}

impl fmt::Debug for CapabilityClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityClaims")
            .field("signing_key", &"<redacted>")
            .field("stash_id", &self.stash_id)
            .field("dweller_id", &self.dweller_id)
            .finish()
    }
}

/// Encodes and decodes capability tokens under one shared secret
///
/// Cloning is cheap; the secret is reference counted. The codec holds no
/// mutable state and may be used from any number of threads at once.
#[derive(Debug, Clone)]
pub struct CapabilityCodec {
    secret: SharedSecret,
    params: KdfParams,
}

impl CapabilityCodec {
    /// Create a codec using the default work factor
    pub fn new(secret: SharedSecret) -> Self {
        Self {
            secret,
            params: KdfParams::default(),
        }
    }

    /// Create a codec with explicit key-derivation parameters
    pub fn with_params(secret: SharedSecret, params: KdfParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { secret, params })
    }

    /// Key-derivation parameters in use
    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Seal the three identifiers into a token using the thread-local CSPRNG
    pub fn encode(&self, signing_key: &str, stash_id: &str, dweller_id: &str) -> Result<String> {
        self.encode_with_rng(&mut rand::thread_rng(), signing_key, stash_id, dweller_id)
    }

    /// Seal the three identifiers into a token, drawing salt and IV from `rng`
    pub fn encode_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        signing_key: &str,
        stash_id: &str,
        dweller_id: &str,
    ) -> Result<String> {
        let plaintext = compose_plaintext(signing_key, stash_id, dweller_id)?;

        let mut iv = [0u8; IV_LEN];
        let mut salt = [0u8; SALT_LEN];
        rng.try_fill_bytes(&mut iv)
            .map_err(|e| CodecError::internal(format!("random source failed: {e}")))?;
        rng.try_fill_bytes(&mut salt)
            .map_err(|e| CodecError::internal(format!("random source failed: {e}")))?;

        let key = derive_key(self.secret.expose_secret(), &salt, &self.params)?;
        let ciphertext = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
            .map_err(|e| CodecError::internal(format!("cipher setup failed: {e}")))?
            .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

        let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + TAG_LEN);
        token.extend_from_slice(&iv);
        token.extend_from_slice(&salt);
        token.extend_from_slice(&ciphertext);

        let mut mac = tag_mac(&key)?;
        mac.update(&token);
        token.extend_from_slice(&mac.finalize().into_bytes());

        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Recover the three identifiers from a token
    ///
    /// Fails with [`CodecError::MalformedToken`] for any token that was not
    /// produced by a codec holding the same secret and parameters.
    pub fn decode(&self, token: &str) -> Result<CapabilityClaims> {
        self.open(token).ok_or(CodecError::MalformedToken)
    }

    fn open(&self, token: &str) -> Option<CapabilityClaims> {
        let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
        if bytes.len() < MIN_TOKEN_LEN || (bytes.len() - HEADER_LEN - TAG_LEN) % BLOCK_SIZE != 0 {
            return None;
        }

        let (body, tag) = bytes.split_at(bytes.len() - TAG_LEN);
        let (iv, rest) = body.split_at(IV_LEN);
        let (salt, ciphertext) = rest.split_at(SALT_LEN);

        let key = derive_key(self.secret.expose_secret(), salt, &self.params).ok()?;
        let mut mac = tag_mac(&key).ok()?;
        mac.update(body);
        mac.verify_slice(tag).ok()?;

        let plaintext = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .ok()
            .map(Zeroizing::new)?;

        parse_plaintext(&plaintext)
    }
}

fn tag_mac(key: &DerivedKey) -> Result<HmacSha256> {
    let mut mac_key = Zeroizing::new([0u8; KEY_LEN]);
    Hkdf::<Sha256>::new(None, key.as_bytes())
        .expand(MAC_INFO, &mut mac_key[..])
        .map_err(|e| CodecError::internal(format!("tag key expansion failed: {e}")))?;
    <HmacSha256 as Mac>::new_from_slice(&mac_key[..])
        .map_err(|e| CodecError::internal(format!("tag setup failed: {e}")))
}

fn compose_plaintext(
    signing_key: &str,
    stash_id: &str,
    dweller_id: &str,
) -> Result<Zeroizing<Vec<u8>>> {
    for (name, value) in [
        ("signing key", signing_key),
        ("stash id", stash_id),
        ("dweller id", dweller_id),
    ] {
        if value.is_empty() {
            return Err(CodecError::invalid_input(format!("{name} must not be empty")));
        }
        if value.contains(DELIMITER) {
            return Err(CodecError::invalid_input(format!(
                "{name} must not contain '{DELIMITER}'"
            )));
        }
    }
    Ok(Zeroizing::new(
        format!("{signing_key}{DELIMITER}{stash_id}{DELIMITER}{dweller_id}").into_bytes(),
    ))
}

fn parse_plaintext(plaintext: &[u8]) -> Option<CapabilityClaims> {
    let text = std::str::from_utf8(plaintext).ok()?;
    let mut fields = text.split(DELIMITER);
    let (signing_key, stash_id, dweller_id) = (fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() || [signing_key, stash_id, dweller_id].contains(&"") {
        return None;
    }
    Some(CapabilityClaims {
        signing_key: signing_key.to_owned(),
        stash_id: stash_id.to_owned(),
        dweller_id: dweller_id.to_owned(),
    })
}
