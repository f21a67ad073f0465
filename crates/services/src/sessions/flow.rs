use exam_core::model::CheckpointState;
use storage::repository::CheckpointSnapshotRepository;

use super::resolver::{Navigation, SessionResolution};
use super::sequencer::{self, Section, SectionTotals, TotalsMode};
use super::starter::{AttemptStarter, StartOutcome};
use crate::error::StartError;

/// How an overview entry resolves before anything renders.
#[derive(Debug)]
pub enum Enter {
    /// Forced navigation: resume a live attempt (which wins over everything)
    /// or fall back to the dashboard when nothing is restorable or startable.
    Redirect(Navigation),
    /// Checkpoint state was restored; render the overview.
    Overview(OverviewFlow),
}

/// Phase of the one overview-to-attempt transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPhase {
    Idle,
    /// A start call is outstanding; further starts are refused.
    Starting,
    /// Package-unavailable choice is pending (continue or exit).
    AwaitingChoice,
    Finished,
}

/// State machine driving one overview screen from entry to a live attempt.
///
/// Construction goes through [`OverviewFlow::enter`], which consumes the
/// resolver's verdict first: the sequencer never decides a next target until
/// the active-session check has completed (or failed open). Resuming an
/// existing attempt always wins over starting a new one.
#[derive(Debug)]
pub struct OverviewFlow {
    checkpoint: CheckpointState,
    phase: StartPhase,
}

impl OverviewFlow {
    /// Resolve how to enter the overview.
    ///
    /// Checkpoint state comes from navigation context when present (and
    /// overwrites the durable snapshot slot, so a reload of this run
    /// restores it), else from the slot, read once here and never polled. A
    /// dead-end checkpoint (nothing startable, something unavailable) and an
    /// exhausted or missing one both short-circuit to the dashboard; the
    /// slot is cleared so a reload does not re-enter a dead state.
    pub async fn enter(
        resolution: &SessionResolution,
        nav_state: Option<CheckpointState>,
        snapshots: &dyn CheckpointSnapshotRepository,
    ) -> Enter {
        if resolution.has_active_session {
            if let Some(attempt_id) = &resolution.active_attempt_id {
                return Enter::Redirect(Navigation::TestRoute(attempt_id.clone()));
            }
        }

        let checkpoint = match nav_state {
            Some(state) => {
                // Fresh navigation overwrites the slot so a reload of this
                // run restores the same checkpoint.
                if let Err(error) = snapshots.save(&state).await {
                    tracing::warn!(%error, "failed to snapshot checkpoint on entry");
                }
                Some(state)
            }
            None => match snapshots.load().await {
                Ok(state) => state,
                Err(error) => {
                    tracing::warn!(%error, "failed to load checkpoint snapshot");
                    None
                }
            },
        };

        let Some(checkpoint) = checkpoint else {
            return Enter::Redirect(Navigation::Dashboard);
        };

        if !checkpoint.has_pending() {
            if let Err(error) = snapshots.clear().await {
                tracing::warn!(%error, "failed to clear checkpoint snapshot");
            }
            return Enter::Redirect(Navigation::Dashboard);
        }

        Enter::Overview(Self {
            checkpoint,
            phase: StartPhase::Idle,
        })
    }

    #[must_use]
    pub fn checkpoint(&self) -> &CheckpointState {
        &self.checkpoint
    }

    #[must_use]
    pub fn phase(&self) -> StartPhase {
        self.phase
    }

    /// Sections for rendering, in the student's original order.
    #[must_use]
    pub fn sections(&self) -> Vec<Section> {
        sequencer::classify(&self.checkpoint)
    }

    #[must_use]
    pub fn totals(&self, mode: TotalsMode) -> SectionTotals {
        sequencer::totals(&self.sections(), mode)
    }

    /// Pick the next category and start it.
    ///
    /// Only one start call may be outstanding; the backend does not
    /// guarantee idempotency, so re-entrant triggering is refused here
    /// rather than deduplicated server-side.
    ///
    /// # Errors
    ///
    /// Returns `StartError::StartInFlight` while a call is outstanding,
    /// `StartError::ChoicePending` while an unavailable-package choice is
    /// unanswered, `StartError::FlowFinished` after the flow ended, and
    /// `StartError::Api` for transport failures (which reset to idle so the
    /// user can re-trigger).
    pub async fn start_next(
        &mut self,
        starter: &AttemptStarter,
    ) -> Result<StartOutcome, StartError> {
        match self.phase {
            StartPhase::Idle => {}
            StartPhase::Starting => return Err(StartError::StartInFlight),
            StartPhase::AwaitingChoice => return Err(StartError::ChoicePending),
            StartPhase::Finished => return Err(StartError::FlowFinished),
        }

        let Some(target) = sequencer::pick_next(&self.checkpoint).cloned() else {
            // Nothing left implies an empty snapshot slot, the same as the
            // starter's own nothing-left path.
            self.phase = StartPhase::Finished;
            starter.discard_snapshot().await;
            return Ok(StartOutcome::NothingLeft);
        };

        self.phase = StartPhase::Starting;
        let result = starter.start(&self.checkpoint, &target).await;

        self.phase = match &result {
            Ok(StartOutcome::Unavailable { .. }) => StartPhase::AwaitingChoice,
            Ok(_) => StartPhase::Finished,
            Err(_) => StartPhase::Idle,
        };

        result
    }

    /// The student chose to continue with the remaining categories after a
    /// package turned out to be unavailable.
    pub fn continue_with(&mut self, remaining: CheckpointState) {
        self.checkpoint = remaining;
        self.phase = StartPhase::Idle;
    }

    /// Explicit exit: clear the durable snapshot and finish the flow.
    ///
    /// There is no cancellation of an in-flight start call; callers disable
    /// interaction until it resolves and exit afterwards.
    pub async fn exit(&mut self, snapshots: &dyn CheckpointSnapshotRepository) {
        if let Err(error) = snapshots.clear().await {
            tracing::warn!(%error, "failed to clear checkpoint snapshot");
        }
        self.phase = StartPhase::Finished;
    }
}
