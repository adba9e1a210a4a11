//! # Stash Access
//!
//! Capability records and their lifecycle: issuing a token that grants one
//! dweller access to one stash, validating presented tokens, and revoking
//! grants.
//!
//! ## Core Concepts
//!
//! - **Capability**: persisted grant carrying the encoded token, with at most
//!   one active record per stash and dweller
//! - **Lifecycle**: issued → used → revoked, driven by [`CapabilityLifecycle`]
//! - **Persistence boundary**: [`CapabilityStore`], with an in-memory
//!   implementation for tests and single-process use
//! - **Clock**: injected time source for `issued_at` and `last_used_at`
//!
//! Token cryptography lives in `stash-crypto`.

#![forbid(unsafe_code)]

/// Capability records and key types
pub mod capability;
/// Time source abstraction
pub mod clock;
/// Access error types
pub mod error;
/// Stash and dweller identifiers
pub mod identifiers;
/// Issuance, validation and revocation
pub mod lifecycle;
/// Stash and dweller views
pub mod stash;
/// Persistence boundary
pub mod store;

pub use capability::{Capability, CapabilityState, KeyType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AccessError, Result};
pub use identifiers::{DwellerId, StashId};
pub use lifecycle::{CapabilityLifecycle, ValidationOutcome};
pub use stash::{Dweller, SigningKey, Stash};
pub use store::{CapabilityStore, MemoryCapabilityStore, StoreError};
