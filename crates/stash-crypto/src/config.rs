//! Codec configuration
//!
//! Deployments tune the work factor and name the environment variable that
//! holds the shared secret. The secret itself never lives in configuration.

use crate::key_derivation::{KdfParams, DEFAULT_ITERATIONS};
use crate::secret::DEFAULT_SECRET_ENV;
use crate::{CapabilityCodec, Result, SharedSecret};
use serde::{Deserialize, Serialize};

/// Serializable codec settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// PBKDF2 iteration count
    pub iterations: u32,
    /// Environment variable holding the shared secret
    pub secret_env: String,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            secret_env: DEFAULT_SECRET_ENV.to_string(),
        }
    }
}

impl CodecConfig {
    /// Create config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the PBKDF2 iteration count
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the environment variable the secret is read from
    pub fn with_secret_env(mut self, var: impl Into<String>) -> Self {
        self.secret_env = var.into();
        self
    }

    /// Validated key-derivation parameters
    pub fn kdf_params(&self) -> Result<KdfParams> {
        KdfParams::new(self.iterations)
    }

    /// Load the secret and build a codec
    pub fn build(&self) -> Result<CapabilityCodec> {
        let params = self.kdf_params()?;
        let secret = SharedSecret::from_env(&self.secret_env)?;
        CapabilityCodec::with_params(secret, params)
    }
}
