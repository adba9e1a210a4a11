//! Access error types
//!
//! Lifecycle violations are reported to the issuing caller with enough detail
//! to decide whether to reissue. Token failures stay opaque.

use crate::identifiers::{DwellerId, StashId};
use crate::store::StoreError;
use stash_crypto::CodecError;
use uuid::Uuid;

/// Errors raised by capability issuance, validation and revocation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// Caller-supplied identifier or key was malformed
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected input
        message: String,
    },

    /// A presented token could not be opened
    #[error("Malformed capability token")]
    MalformedToken,

    /// An active capability already exists for the stash and dweller
    #[error("Active capability already exists for stash {stash_id} and dweller {dweller_id}")]
    DuplicateCapability {
        /// Stash the capability grants access to
        stash_id: StashId,
        /// Dweller the capability was issued to
        dweller_id: DwellerId,
    },

    /// The capability has been revoked
    #[error("Capability {id} has been revoked")]
    RevokedCapability {
        /// Capability record id
        id: Uuid,
    },

    /// The presented token does not match the capability
    #[error("Capability {id} rejected the presented token")]
    InvalidCapability {
        /// Capability record id
        id: Uuid,
    },

    /// No capability record with this id exists
    #[error("Capability {id} not found")]
    NotFound {
        /// Capability record id
        id: Uuid,
    },

    /// The persistence collaborator failed
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// Internal failure such as a lost worker thread
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl AccessError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a duplicate capability error
    pub fn duplicate(stash_id: StashId, dweller_id: DwellerId) -> Self {
        Self::DuplicateCapability {
            stash_id,
            dweller_id,
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<CodecError> for AccessError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::InvalidInput { message } => Self::InvalidInput { message },
            CodecError::MalformedToken => Self::MalformedToken,
            CodecError::Internal { message } => Self::Internal { message },
        }
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                stash_id,
                dweller_id,
            } => Self::DuplicateCapability {
                stash_id,
                dweller_id,
            },
            StoreError::NotFound { id } => Self::NotFound { id },
            StoreError::Backend { message } => Self::Storage { message },
        }
    }
}

/// Access result type
pub type Result<T> = std::result::Result<T, AccessError>;
