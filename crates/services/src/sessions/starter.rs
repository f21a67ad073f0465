use std::sync::Arc;

use exam_core::Clock;
use exam_core::model::{Attempt, AttemptId, CheckpointState, PreparedCategory};
use storage::repository::{AttemptCacheRepository, CheckpointSnapshotRepository};

use crate::api::{SessionApi, StartAttemptReply, StartAttemptRequest};
use crate::error::StartError;

/// Outcome of one start call, one variant per recovery path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// The attempt is live. The checkpoint travels along as navigation
    /// context so the next category resolves without another round-trip.
    Started {
        attempt: Attempt,
        checkpoint: CheckpointState,
    },
    /// The backend reported a different live attempt (another tab or device
    /// won the race). Nothing was created; navigate to the existing attempt.
    ResumeExisting { attempt_id: AttemptId },
    /// The target package vanished but other categories remain. The pruned
    /// checkpoint has been snapshotted; the student chooses continue or exit.
    Unavailable { remaining: CheckpointState },
    /// The target package vanished and nothing startable remains. The
    /// snapshot is cleared; navigate to the dashboard without a prompt.
    NothingLeft,
}

/// Turns a picked category into a live, server-acknowledged attempt.
#[derive(Clone)]
pub struct AttemptStarter {
    api: Arc<dyn SessionApi>,
    cache: Arc<dyn AttemptCacheRepository>,
    snapshots: Arc<dyn CheckpointSnapshotRepository>,
    clock: Clock,
}

impl AttemptStarter {
    #[must_use]
    pub fn new(
        api: Arc<dyn SessionApi>,
        cache: Arc<dyn AttemptCacheRepository>,
        snapshots: Arc<dyn CheckpointSnapshotRepository>,
    ) -> Self {
        Self {
            api,
            cache,
            snapshots,
            clock: Clock::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Start an attempt for the chosen prepared category.
    ///
    /// Authoritative rejections come back as `StartOutcome` variants and are
    /// never retried here; the cache and snapshot writes around a success are
    /// best-effort (the cache is advisory, the server acknowledgment is what
    /// makes the attempt real).
    ///
    /// # Errors
    ///
    /// Returns `StartError::Api` on transport failures; no local state is
    /// mutated in that case.
    pub async fn start(
        &self,
        checkpoint: &CheckpointState,
        target: &PreparedCategory,
    ) -> Result<StartOutcome, StartError> {
        let request = StartAttemptRequest::for_target(checkpoint, target);

        match self.api.start_attempt(&request).await? {
            StartAttemptReply::Started(attempt) => {
                self.record_started(&attempt).await;
                Ok(StartOutcome::Started {
                    attempt,
                    checkpoint: checkpoint.clone(),
                })
            }
            StartAttemptReply::ActiveConflict { attempt_id } => {
                Ok(StartOutcome::ResumeExisting { attempt_id })
            }
            StartAttemptReply::PackageUnavailable => {
                Ok(self.handle_unavailable(checkpoint, target).await)
            }
        }
    }

    /// Empty the snapshot slot, logging instead of failing.
    pub(super) async fn discard_snapshot(&self) {
        if let Err(error) = self.snapshots.clear().await {
            tracing::warn!(%error, "failed to clear checkpoint snapshot");
        }
    }

    async fn record_started(&self, attempt: &Attempt) {
        let now = self.clock.now();
        if let Err(error) = self
            .cache
            .save_session_token(attempt.id(), attempt.session_token(), now)
            .await
        {
            tracing::warn!(attempt_id = %attempt.id(), %error, "failed to cache session token");
        }
        if let Err(error) = self.cache.set_last_attempt(attempt.id()).await {
            tracing::warn!(attempt_id = %attempt.id(), %error, "failed to set last-attempt pointer");
        }
        self.discard_snapshot().await;
    }

    async fn handle_unavailable(
        &self,
        checkpoint: &CheckpointState,
        target: &PreparedCategory,
    ) -> StartOutcome {
        let remaining = checkpoint.pruned(&target.category_id);

        if remaining.has_pending() {
            if let Err(error) = self.snapshots.save(&remaining).await {
                tracing::warn!(%error, "failed to snapshot pruned checkpoint");
            }
            StartOutcome::Unavailable { remaining }
        } else {
            self.discard_snapshot().await;
            StartOutcome::NothingLeft
        }
    }
}
