use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use exam_core::model::{AttemptId, CheckpointState, SessionToken};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Locally cached, advisory copy of one attempt's credentials.
///
/// The server owns attempt existence and expiry; everything here is
/// disposable and subordinate to the next server check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAttempt {
    pub attempt_id: AttemptId,
    pub session_token: SessionToken,
    pub saved_at: DateTime<Utc>,
}

/// Local attempt cache, keyed by attempt id.
///
/// Best-effort by contract: callers are expected to treat failures as
/// diagnostics, not as flow-control.
#[async_trait]
pub trait AttemptCacheRepository: Send + Sync {
    /// Persist the session token for an attempt, overwriting any prior entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the entry cannot be stored.
    async fn save_session_token(
        &self,
        attempt_id: &AttemptId,
        token: &SessionToken,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Fetch the cached entry for an attempt, if present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures; a missing entry is `Ok(None)`.
    async fn get(&self, attempt_id: &AttemptId) -> Result<Option<CachedAttempt>, StorageError>;

    /// Drop the cached entry for one attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be issued.
    async fn clear_local(&self, attempt_id: &AttemptId) -> Result<(), StorageError>;

    /// Drop every cached entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be issued.
    async fn clear_all_local(&self) -> Result<(), StorageError>;

    /// Drop entries saved more than `max_age_hours` before `now`.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the sweep cannot be issued.
    async fn clear_stale_data(
        &self,
        max_age_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    /// Drop every cached entry except the one being resumed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cleanup cannot be issued.
    async fn validate_and_cleanup(&self, keep: &AttemptId) -> Result<(), StorageError>;

    /// Read the last-valid-attempt pointer, if set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn last_attempt(&self) -> Result<Option<AttemptId>, StorageError>;

    /// Point the last-valid-attempt slot at the given attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the pointer cannot be stored.
    async fn set_last_attempt(&self, attempt_id: &AttemptId) -> Result<(), StorageError>;

    /// Clear the pointer only if it currently matches the given attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the pointer cannot be cleared.
    async fn clear_last_attempt_if(&self, attempt_id: &AttemptId) -> Result<(), StorageError>;
}

/// Single mutable slot holding the checkpoint currently in progress.
///
/// This is the reload-survival snapshot: one slot, overwritten when a new
/// run begins, cleared when an attempt starts or the flow is exited. It is
/// session-scoped state, not a cross-device sync mechanism.
#[async_trait]
pub trait CheckpointSnapshotRepository: Send + Sync {
    /// Overwrite the slot with the given checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn save(&self, state: &CheckpointState) -> Result<(), StorageError>;

    /// Read the slot. An empty slot is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage or deserialization failures.
    async fn load(&self) -> Result<Option<CheckpointState>, StorageError>;

    /// Empty the slot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete cannot be issued.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    cache: Arc<Mutex<HashMap<AttemptId, CachedAttempt>>>,
    last_attempt: Arc<Mutex<Option<AttemptId>>>,
    snapshot: Arc<Mutex<Option<CheckpointState>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptCacheRepository for InMemoryRepository {
    async fn save_session_token(
        &self,
        attempt_id: &AttemptId,
        token: &SessionToken,
        saved_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            attempt_id.clone(),
            CachedAttempt {
                attempt_id: attempt_id.clone(),
                session_token: token.clone(),
                saved_at,
            },
        );
        Ok(())
    }

    async fn get(&self, attempt_id: &AttemptId) -> Result<Option<CachedAttempt>, StorageError> {
        let guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(attempt_id).cloned())
    }

    async fn clear_local(&self, attempt_id: &AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(attempt_id);
        Ok(())
    }

    async fn clear_all_local(&self) -> Result<(), StorageError> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.clear();
        Ok(())
    }

    async fn clear_stale_data(
        &self,
        max_age_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let cutoff = now - Duration::hours(i64::from(max_age_hours));
        let mut guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let before = guard.len();
        guard.retain(|_, entry| entry.saved_at >= cutoff);
        Ok((before - guard.len()) as u64)
    }

    async fn validate_and_cleanup(&self, keep: &AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.retain(|id, _| id == keep);
        Ok(())
    }

    async fn last_attempt(&self) -> Result<Option<AttemptId>, StorageError> {
        let guard = self
            .last_attempt
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn set_last_attempt(&self, attempt_id: &AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .last_attempt
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(attempt_id.clone());
        Ok(())
    }

    async fn clear_last_attempt_if(&self, attempt_id: &AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .last_attempt
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.as_ref() == Some(attempt_id) {
            *guard = None;
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointSnapshotRepository for InMemoryRepository {
    async fn save(&self, state: &CheckpointState) -> Result<(), StorageError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = Some(state.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<CheckpointState>, StorageError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// Aggregates the cache and snapshot stores behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub cache: Arc<dyn AttemptCacheRepository>,
    pub snapshots: Arc<dyn CheckpointSnapshotRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let cache: Arc<dyn AttemptCacheRepository> = Arc::new(repo.clone());
        let snapshots: Arc<dyn CheckpointSnapshotRepository> = Arc::new(repo);
        Self { cache, snapshots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{CategoryId, CheckpointState};
    use exam_core::time::fixed_now;

    fn token(value: &str) -> SessionToken {
        SessionToken::new(value)
    }

    #[tokio::test]
    async fn save_and_clear_round_trip() {
        let repo = InMemoryRepository::new();
        let id = AttemptId::new("att-1");

        repo.save_session_token(&id, &token("tok"), fixed_now())
            .await
            .unwrap();
        assert!(repo.get(&id).await.unwrap().is_some());

        repo.clear_local(&id).await.unwrap();
        assert!(repo.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_sweep_removes_only_old_entries() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        let old = now - Duration::hours(48);

        repo.save_session_token(&AttemptId::new("old"), &token("a"), old)
            .await
            .unwrap();
        repo.save_session_token(&AttemptId::new("fresh"), &token("b"), now)
            .await
            .unwrap();

        let removed = repo.clear_stale_data(24, now).await.unwrap();

        assert_eq!(removed, 1);
        assert!(repo.get(&AttemptId::new("old")).await.unwrap().is_none());
        assert!(repo.get(&AttemptId::new("fresh")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_all_drops_every_entry() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        for id in ["att-1", "att-2"] {
            repo.save_session_token(&AttemptId::new(id), &token("t"), now)
                .await
                .unwrap();
        }

        repo.clear_all_local().await.unwrap();

        assert!(repo.get(&AttemptId::new("att-1")).await.unwrap().is_none());
        assert!(repo.get(&AttemptId::new("att-2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn validate_and_cleanup_keeps_only_the_resumed_attempt() {
        let repo = InMemoryRepository::new();
        let now = fixed_now();
        for id in ["att-1", "att-2", "att-3"] {
            repo.save_session_token(&AttemptId::new(id), &token("t"), now)
                .await
                .unwrap();
        }

        repo.validate_and_cleanup(&AttemptId::new("att-2"))
            .await
            .unwrap();

        assert!(repo.get(&AttemptId::new("att-1")).await.unwrap().is_none());
        assert!(repo.get(&AttemptId::new("att-2")).await.unwrap().is_some());
        assert!(repo.get(&AttemptId::new("att-3")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_attempt_pointer_clears_only_on_match() {
        let repo = InMemoryRepository::new();
        let id = AttemptId::new("att-1");
        repo.set_last_attempt(&id).await.unwrap();

        repo.clear_last_attempt_if(&AttemptId::new("other"))
            .await
            .unwrap();
        assert_eq!(repo.last_attempt().await.unwrap(), Some(id.clone()));

        repo.clear_last_attempt_if(&id).await.unwrap();
        assert_eq!(repo.last_attempt().await.unwrap(), None);
    }

    #[tokio::test]
    async fn snapshot_slot_overwrites_and_clears() {
        let repo = InMemoryRepository::new();
        let first =
            CheckpointState::new(vec![CategoryId::new("a")], Vec::new(), None).unwrap();
        let second =
            CheckpointState::new(vec![CategoryId::new("b")], Vec::new(), None).unwrap();

        CheckpointSnapshotRepository::save(&repo, &first).await.unwrap();
        CheckpointSnapshotRepository::save(&repo, &second).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), Some(second));

        CheckpointSnapshotRepository::clear(&repo).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), None);
    }
}
