//! Capability lifecycle
//!
//! Issues tokens for (stash, dweller) pairs, validates presented tokens and
//! revokes capabilities. Token sealing and opening run on the blocking pool
//! because key derivation is deliberately slow.
//!
//! Validation fails closed: a token that cannot be opened, a mismatch in any
//! of the three sealed fields, or a revoked record all yield `false`. Tokens,
//! signing keys and the shared secret are never logged.

use crate::capability::{Capability, KeyType};
use crate::clock::{Clock, SystemClock};
use crate::identifiers::{DwellerId, StashId};
use crate::stash::{Dweller, Stash};
use crate::store::CapabilityStore;
use crate::{AccessError, Result};
use stash_crypto::{constant_time_eq, CapabilityClaims, CapabilityCodec};
use std::sync::Arc;
use uuid::Uuid;

/// Result of checking a presented token against a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Token matches an active capability
    Valid,
    /// Token could not be opened or does not match
    Invalid,
    /// Capability is revoked; the token was not examined
    Revoked,
}

impl ValidationOutcome {
    /// Whether access should be granted
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Convert into an error for callers that propagate with `?`
    pub fn into_result(self, id: Uuid) -> Result<()> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid => Err(AccessError::InvalidCapability { id }),
            Self::Revoked => Err(AccessError::RevokedCapability { id }),
        }
    }
}

/// Issues, validates and revokes capabilities
pub struct CapabilityLifecycle<S: CapabilityStore + ?Sized> {
    store: Arc<S>,
    codec: CapabilityCodec,
    clock: Arc<dyn Clock>,
}

impl<S: CapabilityStore + ?Sized> CapabilityLifecycle<S> {
    /// Create a lifecycle over a store, using wall-clock time
    pub fn new(store: Arc<S>, codec: CapabilityCodec) -> Self {
        Self {
            store,
            codec,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Issue a capability granting `dweller` access to `stash`
    ///
    /// Fails with [`AccessError::DuplicateCapability`] if an active capability
    /// already exists for the pair, including when a concurrent issuer commits
    /// first.
    pub async fn issue(
        &self,
        stash: &Stash,
        dweller: &Dweller,
        key_type: KeyType,
    ) -> Result<Capability> {
        if let Some(existing) = self.store.find_active(&stash.id, &dweller.id).await? {
            tracing::warn!(
                capability_id = %existing.id,
                stash_id = %stash.id,
                dweller_id = %dweller.id,
                "active capability already exists"
            );
            return Err(AccessError::duplicate(stash.id.clone(), dweller.id.clone()));
        }

        let key_value = self.seal(stash, &dweller.id).await?;
        self.commit(stash, dweller, key_type, key_value).await
    }

    /// Revoke any active capability for the pair and issue a fresh one
    ///
    /// The new token is sealed before the old capability is revoked, so a
    /// failure to seal leaves the existing grant in place. If a concurrent
    /// issuer commits between the revocation and the insert, its capability
    /// stands and this call fails with [`AccessError::DuplicateCapability`].
    pub async fn reissue(
        &self,
        stash: &Stash,
        dweller: &Dweller,
        key_type: KeyType,
    ) -> Result<Capability> {
        let key_value = self.seal(stash, &dweller.id).await?;
        if let Some(active) = self.store.find_active(&stash.id, &dweller.id).await? {
            self.revoke(&active).await?;
        }
        self.commit(stash, dweller, key_type, key_value).await
    }

    /// Check a presented token and record the use on success
    pub async fn validate(
        &self,
        stash: &Stash,
        capability: &Capability,
        presented: &str,
    ) -> Result<bool> {
        Ok(self.verify(stash, capability, presented).await?.is_valid())
    }

    /// Check a presented token, reporting why it was rejected
    ///
    /// The persisted record is reloaded so a revocation committed after the
    /// caller fetched `capability` is honoured. Never changes `is_active`.
    pub async fn verify(
        &self,
        stash: &Stash,
        capability: &Capability,
        presented: &str,
    ) -> Result<ValidationOutcome> {
        let current = self
            .store
            .get(capability.id)
            .await?
            .ok_or(AccessError::NotFound { id: capability.id })?;

        if !current.is_active {
            tracing::debug!(
                capability_id = %current.id,
                "rejected token for revoked capability"
            );
            return Ok(ValidationOutcome::Revoked);
        }
        if current.stash_id != stash.id {
            tracing::debug!(
                capability_id = %current.id,
                stash_id = %stash.id,
                "capability belongs to a different stash"
            );
            return Ok(ValidationOutcome::Invalid);
        }

        let Some(claims) = self.open(presented).await? else {
            tracing::debug!(
                capability_id = %current.id,
                "presented token could not be opened"
            );
            return Ok(ValidationOutcome::Invalid);
        };

        let key_ok = stash.signing_key.matches(claims.signing_key());
        let stash_ok = constant_time_eq(
            claims.stash_id().as_bytes(),
            current.stash_id.as_str().as_bytes(),
        );
        let dweller_ok = constant_time_eq(
            claims.dweller_id().as_bytes(),
            current.dweller_id.as_str().as_bytes(),
        );
        if !(key_ok & stash_ok & dweller_ok) {
            tracing::debug!(
                capability_id = %current.id,
                "presented token does not match capability"
            );
            return Ok(ValidationOutcome::Invalid);
        }

        // Revocation may have committed while the token was being opened
        if !self.store.touch(current.id, self.clock.now()).await? {
            tracing::debug!(
                capability_id = %current.id,
                "capability revoked during validation"
            );
            return Ok(ValidationOutcome::Revoked);
        }
        tracing::debug!(capability_id = %current.id, "validated capability");
        Ok(ValidationOutcome::Valid)
    }

    /// Revoke a capability
    ///
    /// Idempotent. Returns true only for the call that performed the revocation.
    pub async fn revoke(&self, capability: &Capability) -> Result<bool> {
        let changed = self.store.deactivate(capability.id).await?;
        if changed {
            tracing::info!(
                capability_id = %capability.id,
                stash_id = %capability.stash_id,
                dweller_id = %capability.dweller_id,
                "revoked capability"
            );
        } else {
            tracing::debug!(capability_id = %capability.id, "capability already revoked");
        }
        Ok(changed)
    }

    /// Active capability for a stash and dweller
    pub async fn active_capability(
        &self,
        stash_id: &StashId,
        dweller_id: &DwellerId,
    ) -> Result<Option<Capability>> {
        Ok(self.store.find_active(stash_id, dweller_id).await?)
    }

    /// Every capability issued for a stash, oldest first
    pub async fn capabilities_for(&self, stash_id: &StashId) -> Result<Vec<Capability>> {
        Ok(self.store.list_for_stash(stash_id).await?)
    }

    /// Find the active capability a presented token was issued under
    ///
    /// Returns `None` when the token cannot be opened, was sealed for another
    /// stash or signing key, or its dweller holds no active capability.
    pub async fn resolve(&self, stash: &Stash, presented: &str) -> Result<Option<Capability>> {
        let Some(claims) = self.open(presented).await? else {
            return Ok(None);
        };

        let key_ok = stash.signing_key.matches(claims.signing_key());
        let stash_ok =
            constant_time_eq(claims.stash_id().as_bytes(), stash.id.as_str().as_bytes());
        if !(key_ok & stash_ok) {
            return Ok(None);
        }
        let Ok(dweller_id) = DwellerId::new(claims.dweller_id()) else {
            return Ok(None);
        };
        Ok(self.store.find_active(&stash.id, &dweller_id).await?)
    }

    async fn commit(
        &self,
        stash: &Stash,
        dweller: &Dweller,
        key_type: KeyType,
        key_value: String,
    ) -> Result<Capability> {
        let capability = Capability::issued(
            stash.id.clone(),
            dweller.id.clone(),
            key_type,
            key_value,
            self.clock.now(),
        );

        if let Err(err) = self.store.insert(capability.clone()).await {
            tracing::warn!(
                stash_id = %stash.id,
                dweller_id = %dweller.id,
                error = %err,
                "capability insert rejected"
            );
            return Err(err.into());
        }

        tracing::info!(
            capability_id = %capability.id,
            stash_id = %capability.stash_id,
            dweller_id = %capability.dweller_id,
            key_type = %capability.key_type,
            "issued capability"
        );
        Ok(capability)
    }

    async fn seal(&self, stash: &Stash, dweller_id: &DwellerId) -> Result<String> {
        let codec = self.codec.clone();
        let signing_key = stash.signing_key.clone();
        let stash_id = stash.id.clone();
        let dweller_id = dweller_id.clone();

        let sealed = tokio::task::spawn_blocking(move || {
            codec.encode(
                signing_key.expose_secret(),
                stash_id.as_str(),
                dweller_id.as_str(),
            )
        })
        .await
        .map_err(|e| AccessError::internal(format!("token sealing task failed: {e}")))?;
        Ok(sealed?)
    }

    async fn open(&self, presented: &str) -> Result<Option<CapabilityClaims>> {
        let codec = self.codec.clone();
        let presented = presented.to_owned();

        let opened = tokio::task::spawn_blocking(move || codec.decode(&presented))
            .await
            .map_err(|e| AccessError::internal(format!("token opening task failed: {e}")))?;
        Ok(opened.ok())
    }
}
