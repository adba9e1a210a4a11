//! Capability lifecycle end to end: issue, validate, revoke, reissue.

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use stash_access::{
    AccessError, Capability, CapabilityLifecycle, CapabilityState, CapabilityStore, Dweller,
    DwellerId, FixedClock, KeyType, MemoryCapabilityStore, SigningKey, Stash, StashId,
    StoreError, ValidationOutcome,
};
use stash_crypto::{CapabilityCodec, SharedSecret};
use std::sync::Arc;
use uuid::Uuid;

fn start_time() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap()
}

fn lifecycle(clock: Arc<FixedClock>) -> CapabilityLifecycle<MemoryCapabilityStore> {
    let codec = CapabilityCodec::new(SharedSecret::new("shared-secret").unwrap());
    CapabilityLifecycle::new(Arc::new(MemoryCapabilityStore::new()), codec).with_clock(clock)
}

fn stash(id: &str, key: &str) -> Stash {
    Stash::new(StashId::new(id).unwrap(), SigningKey::new(key).unwrap())
}

fn dweller(id: &str) -> Dweller {
    Dweller::new(DwellerId::new(id).unwrap())
}

#[tokio::test]
async fn end_to_end_issue_validate_revoke() {
    let clock = Arc::new(FixedClock::new(start_time()));
    let lifecycle = lifecycle(clock.clone());
    let s1 = stash("S1", "SK1");
    let d1 = dweller("D1");

    let capability = lifecycle.issue(&s1, &d1, KeyType::QrCode).await.unwrap();
    assert!(capability.is_active);
    assert_eq!(capability.last_used_at, None);
    assert_eq!(capability.issued_at, start_time());
    assert_eq!(capability.state(), CapabilityState::Issued);

    clock.advance(Duration::minutes(5));
    assert!(lifecycle
        .validate(&s1, &capability, &capability.key_value)
        .await
        .unwrap());

    let stored = persisted(lifecycle.store(), capability.id).await;
    assert_eq!(stored.last_used_at, Some(start_time() + Duration::minutes(5)));
    assert_eq!(stored.state(), CapabilityState::Used);

    assert!(lifecycle.revoke(&capability).await.unwrap());
    assert!(!lifecycle
        .validate(&s1, &capability, &capability.key_value)
        .await
        .unwrap());

    let stored = persisted(lifecycle.store(), capability.id).await;
    assert_eq!(stored.state(), CapabilityState::Revoked);
}

#[tokio::test]
async fn duplicate_issue_is_rejected() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let d1 = dweller("D1");

    lifecycle.issue(&s1, &d1, KeyType::Url).await.unwrap();
    let err = lifecycle.issue(&s1, &d1, KeyType::Code).await.unwrap_err();
    assert_matches!(
        err,
        AccessError::DuplicateCapability { ref stash_id, ref dweller_id }
            if stash_id == &s1.id && dweller_id == &d1.id
    );

    // A different dweller on the same stash is unaffected
    lifecycle
        .issue(&s1, &dweller("D2"), KeyType::Url)
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_issue_has_one_winner() {
    let lifecycle = Arc::new(lifecycle(Arc::new(FixedClock::new(start_time()))));
    let s1 = stash("S1", "SK1");
    let d1 = dweller("D1");

    let (first, second) = tokio::join!(
        lifecycle.issue(&s1, &d1, KeyType::QrCode),
        lifecycle.issue(&s1, &d1, KeyType::QrCode),
    );

    let winners = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = if first.is_ok() { second } else { first };
    assert_matches!(loser, Err(AccessError::DuplicateCapability { .. }));
    assert_eq!(lifecycle.capabilities_for(&s1.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn revoke_is_idempotent() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let capability = lifecycle
        .issue(&stash("S1", "SK1"), &dweller("D1"), KeyType::Code)
        .await
        .unwrap();

    assert!(lifecycle.revoke(&capability).await.unwrap());
    assert!(!lifecycle.revoke(&capability).await.unwrap());
    assert!(!lifecycle.revoke(&capability).await.unwrap());
}

#[tokio::test]
async fn revoked_outcome_maps_to_error() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let capability = lifecycle
        .issue(&s1, &dweller("D1"), KeyType::Code)
        .await
        .unwrap();
    lifecycle.revoke(&capability).await.unwrap();

    let outcome = lifecycle
        .verify(&s1, &capability, &capability.key_value)
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Revoked);
    assert_eq!(
        outcome.into_result(capability.id),
        Err(AccessError::RevokedCapability { id: capability.id })
    );
}

#[tokio::test]
async fn validation_does_not_touch_on_failure() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let capability = lifecycle
        .issue(&s1, &dweller("D1"), KeyType::Code)
        .await
        .unwrap();

    assert!(!lifecycle
        .validate(&s1, &capability, "not-a-token")
        .await
        .unwrap());
    let outcome = lifecycle
        .verify(&s1, &capability, "not-a-token")
        .await
        .unwrap();
    assert_eq!(
        outcome.into_result(capability.id),
        Err(AccessError::InvalidCapability { id: capability.id })
    );

    let stored = persisted(lifecycle.store(), capability.id).await;
    assert_eq!(stored.last_used_at, None);
    assert!(stored.is_active);
}

#[tokio::test]
async fn token_for_another_dweller_is_rejected() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let for_d1 = lifecycle
        .issue(&s1, &dweller("D1"), KeyType::Url)
        .await
        .unwrap();
    let for_d2 = lifecycle
        .issue(&s1, &dweller("D2"), KeyType::Url)
        .await
        .unwrap();

    assert!(!lifecycle
        .validate(&s1, &for_d1, &for_d2.key_value)
        .await
        .unwrap());
    assert!(lifecycle
        .validate(&s1, &for_d2, &for_d2.key_value)
        .await
        .unwrap());
}

#[tokio::test]
async fn rotated_signing_key_invalidates_outstanding_tokens() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let original = stash("S1", "SK1");
    let capability = lifecycle
        .issue(&original, &dweller("D1"), KeyType::Code)
        .await
        .unwrap();

    let rotated = stash("S1", "SK1-rotated");
    assert!(!lifecycle
        .validate(&rotated, &capability, &capability.key_value)
        .await
        .unwrap());
}

#[tokio::test]
async fn capability_checked_against_its_own_stash() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let capability = lifecycle
        .issue(&s1, &dweller("D1"), KeyType::Code)
        .await
        .unwrap();

    let outcome = lifecycle
        .verify(&stash("S2", "SK1"), &capability, &capability.key_value)
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Invalid);
}

#[tokio::test]
async fn token_from_another_deployment_is_rejected() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let capability = lifecycle
        .issue(&s1, &dweller("D1"), KeyType::Code)
        .await
        .unwrap();

    let foreign = CapabilityCodec::new(SharedSecret::new("other-secret").unwrap())
        .encode("SK1", "S1", "D1")
        .unwrap();
    assert!(!lifecycle.validate(&s1, &capability, &foreign).await.unwrap());
}

#[tokio::test]
async fn reissue_replaces_active_capability() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let d1 = dweller("D1");

    let first = lifecycle.issue(&s1, &d1, KeyType::QrCode).await.unwrap();
    let second = lifecycle.reissue(&s1, &d1, KeyType::Url).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(first.key_value, second.key_value);
    assert!(!lifecycle.validate(&s1, &first, &first.key_value).await.unwrap());
    assert!(lifecycle
        .validate(&s1, &second, &second.key_value)
        .await
        .unwrap());

    let active = lifecycle.active_capability(&s1.id, &d1.id).await.unwrap();
    assert_eq!(active.map(|c| c.id), Some(second.id));

    let history = lifecycle.capabilities_for(&s1.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history.iter().filter(|c| c.is_active).count(), 1);
}

#[tokio::test]
async fn resolve_finds_capability_from_token() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let capability = lifecycle
        .issue(&s1, &dweller("D1"), KeyType::Url)
        .await
        .unwrap();

    let resolved = lifecycle.resolve(&s1, &capability.key_value).await.unwrap();
    assert_eq!(resolved.map(|c| c.id), Some(capability.id));

    assert_eq!(
        lifecycle
            .resolve(&stash("S1", "SK2"), &capability.key_value)
            .await
            .unwrap(),
        None
    );
    assert_eq!(lifecycle.resolve(&s1, "garbage").await.unwrap(), None);

    lifecycle.revoke(&capability).await.unwrap();
    assert_eq!(
        lifecycle.resolve(&s1, &capability.key_value).await.unwrap(),
        None
    );
}

#[tokio::test]
async fn validating_unknown_capability_is_not_found() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let orphan = Capability::issued(
        s1.id.clone(),
        DwellerId::new("D1").unwrap(),
        KeyType::Code,
        "token".to_string(),
        start_time(),
    );

    let err = lifecycle
        .validate(&s1, &orphan, &orphan.key_value)
        .await
        .unwrap_err();
    assert_eq!(err, AccessError::NotFound { id: orphan.id });
}

#[tokio::test]
async fn concurrent_reissue_leaves_one_active_capability() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let d1 = dweller("D1");
    let original = lifecycle.issue(&s1, &d1, KeyType::Code).await.unwrap();

    let (renewed, competing) = tokio::join!(
        lifecycle.reissue(&s1, &d1, KeyType::Url),
        lifecycle.reissue(&s1, &d1, KeyType::QrCode),
    );
    for outcome in [&renewed, &competing] {
        if let Err(err) = outcome {
            assert_matches!(err, AccessError::DuplicateCapability { .. });
        }
    }
    assert!(renewed.is_ok() || competing.is_ok());

    let history = lifecycle.capabilities_for(&s1.id).await.unwrap();
    let active: Vec<_> = history.iter().filter(|c| c.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_ne!(active[0].id, original.id);
    assert_eq!(
        lifecycle
            .active_capability(&s1.id, &d1.id)
            .await
            .unwrap()
            .map(|c| c.id),
        Some(active[0].id)
    );
}

#[tokio::test]
async fn reissue_racing_issue_keeps_the_pair_covered() {
    let lifecycle = lifecycle(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let d1 = dweller("D1");
    lifecycle.issue(&s1, &d1, KeyType::Code).await.unwrap();

    let (renewed, fresh) = tokio::join!(
        lifecycle.reissue(&s1, &d1, KeyType::Url),
        lifecycle.issue(&s1, &d1, KeyType::Code),
    );
    if let Err(err) = &renewed {
        assert_matches!(err, AccessError::DuplicateCapability { .. });
    }
    if let Err(err) = &fresh {
        assert_matches!(err, AccessError::DuplicateCapability { .. });
    }

    let active = lifecycle.active_capability(&s1.id, &d1.id).await.unwrap();
    assert!(active.is_some());
}

/// Store that revokes a record right after handing it out, standing in for a
/// revocation that commits while a presented token is being opened.
struct RevokeAfterLoad {
    inner: MemoryCapabilityStore,
}

#[async_trait]
impl CapabilityStore for RevokeAfterLoad {
    async fn find_active(
        &self,
        stash_id: &StashId,
        dweller_id: &DwellerId,
    ) -> Result<Option<Capability>, StoreError> {
        self.inner.find_active(stash_id, dweller_id).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Capability>, StoreError> {
        let loaded = self.inner.get(id).await?;
        if loaded.is_some() {
            self.inner.deactivate(id).await?;
        }
        Ok(loaded)
    }

    async fn insert(&self, capability: Capability) -> Result<(), StoreError> {
        self.inner.insert(capability).await
    }

    async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> Result<bool, StoreError> {
        self.inner.touch(id, used_at).await
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.deactivate(id).await
    }

    async fn list_for_stash(&self, stash_id: &StashId) -> Result<Vec<Capability>, StoreError> {
        self.inner.list_for_stash(stash_id).await
    }
}

#[tokio::test]
async fn revocation_during_validation_wins() {
    let codec = CapabilityCodec::new(SharedSecret::new("shared-secret").unwrap());
    let store = Arc::new(RevokeAfterLoad {
        inner: MemoryCapabilityStore::new(),
    });
    let lifecycle = CapabilityLifecycle::new(store.clone(), codec)
        .with_clock(Arc::new(FixedClock::new(start_time())));
    let s1 = stash("S1", "SK1");
    let capability = lifecycle
        .issue(&s1, &dweller("D1"), KeyType::Code)
        .await
        .unwrap();

    let outcome = lifecycle
        .verify(&s1, &capability, &capability.key_value)
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Revoked);

    let stored = persisted(&store.inner, capability.id).await;
    assert!(!stored.is_active);
    assert_eq!(stored.last_used_at, None);
}

async fn persisted(store: &MemoryCapabilityStore, id: Uuid) -> Capability {
    store.get(id).await.unwrap().unwrap()
}
