//! Codec errors
//!
//! Decoding failures collapse into a single [`CodecError::MalformedToken`]
//! variant that carries no detail, so callers cannot tell a bad encoding from a
//! failed integrity check or a wrong shared secret.

/// Errors raised by key derivation and the capability codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Caller-supplied input was rejected before any cryptographic work
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of the rejected input
        message: String,
    },

    /// A presented token could not be decoded, authenticated or decrypted
    #[error("Malformed capability token")]
    MalformedToken,

    /// Internal failure unrelated to the presented input
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the failure
        message: String,
    },
}

impl CodecError {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
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

/// Codec result type
pub type Result<T> = std::result::Result<T, CodecError>;
