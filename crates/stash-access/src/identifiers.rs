//! Stash and dweller identifiers
//!
//! Identifiers travel inside capability tokens, so they may not be empty and
//! may not contain the token field delimiter. Fresh identifiers are random
//! UUIDs in their hyphenated form.

use crate::{AccessError, Result};
use serde::{Deserialize, Serialize};
use stash_crypto::DELIMITER;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

fn check_identifier(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AccessError::invalid_input(format!("{kind} must not be empty")));
    }
    if value.contains(DELIMITER) {
        return Err(AccessError::invalid_input(format!(
            "{kind} must not contain '{DELIMITER}'"
        )));
    }
    Ok(())
}

macro_rules! token_identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                check_identifier($kind, &value)?;
                Ok(Self(value))
            }

            /// Generate a random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow the identifier text
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid.to_string())
            }
        }

        impl TryFrom<String> for $name {
            type Error = AccessError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl FromStr for $name {
            type Err = AccessError;

            fn from_str(s: &str) -> Result<Self> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

token_identifier!(
    /// Identifier of a protected stash
    StashId,
    "stash id"
);

token_identifier!(
    /// Identifier of a dweller granted access to stashes
    DwellerId,
    "dweller id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct_uuids() {
        let a = StashId::generate();
        let b = StashId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_rejects_delimiter_and_empty() {
        assert!(StashId::new("S1").is_ok());
        assert!(matches!(
            StashId::new("S:1"),
            Err(AccessError::InvalidInput { .. })
        ));
        assert!(matches!(
            DwellerId::new(""),
            Err(AccessError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_serde_validates() {
        let id: DwellerId = serde_json::from_str("\"D1\"").unwrap();
        assert_eq!(id.as_str(), "D1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"D1\"");
        assert!(serde_json::from_str::<DwellerId>("\"D:1\"").is_err());
    }

    #[test]
    fn test_from_uuid_matches_display() {
        let uuid = Uuid::new_v4();
        assert_eq!(StashId::from(uuid).to_string(), uuid.to_string());
    }
}
