//! Capability records
//!
//! A capability is the persisted grant of one stash to one dweller. Its token
//! (`key_value`) is handed to the dweller as a QR code, a URL or a typed code.
//!
//! ```text
//! Issued --validate--> Used --validate--> Used
//!   |                    |
//!   +------revoke--------+--> Revoked (terminal)
//! ```

use crate::identifiers::{DwellerId, StashId};
use crate::{AccessError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How a capability token reaches the dweller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Token carried in a QR code
    #[serde(rename = "QR Code")]
    QrCode,
    /// Token carried in a URL query parameter
    #[serde(rename = "URL")]
    Url,
    /// Token entered by hand
    #[serde(rename = "Code")]
    Code,
}

impl KeyType {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            KeyType::QrCode => "QR Code",
            KeyType::Url => "URL",
            KeyType::Code => "Code",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for KeyType {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qr code" | "qr" | "qrcode" => Ok(KeyType::QrCode),
            "url" => Ok(KeyType::Url),
            "code" => Ok(KeyType::Code),
            other => Err(AccessError::invalid_input(format!("unknown key type: {other}"))),
        }
    }
}

/// Observable state of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityState {
    /// Active and never successfully validated
    Issued,
    /// Active and validated at least once
    Used,
    /// Revoked; terminal
    Revoked,
}

/// Persisted grant of a stash to a dweller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// Record identifier
    pub id: Uuid,
    /// Stash the capability grants access to
    pub stash_id: StashId,
    /// Dweller the capability was issued to
    pub dweller_id: DwellerId,
    /// Transport the token was issued for
    pub key_type: KeyType,
    /// Encoded token
    pub key_value: String,
    /// Issuance time
    pub issued_at: DateTime<Utc>,
    /// Cleared on revocation and never set again
    pub is_active: bool,
    /// Time of the most recent successful validation
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Capability {
    /// Create a freshly issued, active capability
    pub fn issued(
        stash_id: StashId,
        dweller_id: DwellerId,
        key_type: KeyType,
        key_value: String,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            stash_id,
            dweller_id,
            key_type,
            key_value,
            issued_at,
            is_active: true,
            last_used_at: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> CapabilityState {
        match (self.is_active, self.last_used_at) {
            (false, _) => CapabilityState::Revoked,
            (true, None) => CapabilityState::Issued,
            (true, Some(_)) => CapabilityState::Used,
        }
    }

    /// Whether the capability has been revoked
    pub fn is_revoked(&self) -> bool {
        !self.is_active
    }

    /// Whether this capability covers the given stash and dweller
    pub fn grants(&self, stash_id: &StashId, dweller_id: &DwellerId) -> bool {
        &self.stash_id == stash_id && &self.dweller_id == dweller_id
    }
}
