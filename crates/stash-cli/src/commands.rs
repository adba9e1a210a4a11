//! Subcommand handlers
//!
//! Each handler takes a ready codec and returns what should be printed, so
//! the binary only deals with argument parsing and output.

use anyhow::{bail, Result};
use stash_crypto::CapabilityCodec;

/// Seal a token for a signing key, stash and dweller
pub fn encode(
    codec: &CapabilityCodec,
    signing_key: &str,
    stash: &str,
    dweller: &str,
) -> Result<String> {
    let token = codec.encode(signing_key, stash, dweller)?;
    tracing::info!(stash_id = stash, dweller_id = dweller, "encoded token");
    Ok(token)
}

/// Open a token and describe its fields
pub fn decode(codec: &CapabilityCodec, token: &str, show_signing_key: bool) -> Result<String> {
    let claims = codec.decode(token)?;
    let mut out = format!(
        "stash_id: {}\ndweller_id: {}",
        claims.stash_id(),
        claims.dweller_id()
    );
    if show_signing_key {
        out.push_str(&format!("\nsigning_key: {}", claims.signing_key()));
    }
    Ok(out)
}

/// Check that a token was sealed for exactly these values
pub fn verify(
    codec: &CapabilityCodec,
    token: &str,
    signing_key: &str,
    stash: &str,
    dweller: &str,
) -> Result<()> {
    let claims = codec.decode(token)?;
    if !claims.matches(signing_key, stash, dweller) {
        tracing::debug!(stash_id = stash, dweller_id = dweller, "token does not match");
        bail!("Token does not match the given signing key, stash and dweller");
    }
    tracing::debug!(stash_id = stash, dweller_id = dweller, "token verified");
    Ok(())
}
