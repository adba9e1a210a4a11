//! Persistence boundary for capability records
//!
//! Implementations must uphold two guarantees the lifecycle relies on:
//! inserts enforce "one active capability per stash and dweller" atomically,
//! and deactivation only ever moves `is_active` from true to false.

use crate::capability::Capability;
use crate::identifiers::{DwellerId, StashId};
use async_lock::Mutex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Errors reported by a capability store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// An active capability already exists for the pair
    #[error("Active capability already exists for stash {stash_id} and dweller {dweller_id}")]
    Conflict {
        /// Stash of the conflicting record
        stash_id: StashId,
        /// Dweller of the conflicting record
        dweller_id: DwellerId,
    },

    /// No record with this id
    #[error("Capability {id} not found")]
    NotFound {
        /// Requested record id
        id: Uuid,
    },

    /// Backend failure
    #[error("Backend error: {message}")]
    Backend {
        /// Description of the failure
        message: String,
    },
}

impl StoreError {
    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Storage interface for capability records
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    /// Active capability for a stash and dweller, if any
    async fn find_active(
        &self,
        stash_id: &StashId,
        dweller_id: &DwellerId,
    ) -> Result<Option<Capability>, StoreError>;

    /// Load a record by id
    async fn get(&self, id: Uuid) -> Result<Option<Capability>, StoreError>;

    /// Persist a new record
    ///
    /// Fails with [`StoreError::Conflict`] when the record is active and another
    /// active record exists for the same stash and dweller.
    async fn insert(&self, capability: Capability) -> Result<(), StoreError>;

    /// Record a successful use on an active record. Last write wins.
    ///
    /// Returns false, leaving the record untouched, when it has already been
    /// deactivated.
    async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Clear `is_active`. Returns true only for the call that changed it.
    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Every record for a stash, oldest first
    async fn list_for_stash(&self, stash_id: &StashId) -> Result<Vec<Capability>, StoreError>;
}

/// Default in-memory store (intended for tests and single-process use)
pub struct MemoryCapabilityStore {
    records: Mutex<HashMap<Uuid, Capability>>,
}

impl MemoryCapabilityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, active or not
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

impl Default for MemoryCapabilityStore {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CapabilityStore for MemoryCapabilityStore {
    async fn find_active(
        &self,
        stash_id: &StashId,
        dweller_id: &DwellerId,
    ) -> Result<Option<Capability>, StoreError> {
        let guard = self.records.lock().await;
        Ok(guard
            .values()
            .find(|c| c.is_active && c.grants(stash_id, dweller_id))
            .cloned())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Capability>, StoreError> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn insert(&self, capability: Capability) -> Result<(), StoreError> {
        let mut guard = self.records.lock().await;
        if guard.contains_key(&capability.id) {
            return Err(StoreError::backend(format!(
                "capability {} already stored",
                capability.id
            )));
        }
        if capability.is_active
            && guard
                .values()
                .any(|c| c.is_active && c.grants(&capability.stash_id, &capability.dweller_id))
        {
            return Err(StoreError::Conflict {
                stash_id: capability.stash_id,
                dweller_id: capability.dweller_id,
            });
        }
        guard.insert(capability.id, capability);
        Ok(())
    }

    async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut guard = self.records.lock().await;
        let record = guard.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        if !record.is_active {
            return Ok(false);
        }
        record.last_used_at = Some(used_at);
        Ok(true)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut guard = self.records.lock().await;
        let record = guard.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        let changed = record.is_active;
        record.is_active = false;
        Ok(changed)
    }

    async fn list_for_stash(&self, stash_id: &StashId) -> Result<Vec<Capability>, StoreError> {
        let guard = self.records.lock().await;
        let mut records: Vec<Capability> = guard
            .values()
            .filter(|c| &c.stash_id == stash_id)
            .cloned()
            .collect();
        records.sort_by_key(|c| c.issued_at);
        Ok(records)
    }
}
