//! CLI configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stash_crypto::CodecConfig;
use std::path::Path;

/// Contents of the `stash` config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Token codec settings
    pub codec: CodecConfig,
}

/// Load configuration, falling back to defaults when the file is absent
pub fn load_config(path: &Path) -> Result<CliConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(CliConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let config: CliConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        iterations = config.codec.iterations,
        secret_env = %config.codec.secret_env,
        "loaded config"
    );
    Ok(config)
}
