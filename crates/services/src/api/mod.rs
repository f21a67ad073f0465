use async_trait::async_trait;

use exam_core::model::{
    Attempt, AttemptId, CategoryId, CheckpointState, PackageId, PreparedCategory, RecordId,
};

use crate::error::ApiError;

mod http;

pub use http::{ApiConfig, HttpSessionApi};

/// Server-side descriptor of a non-finalized attempt the user currently owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub attempt_id: AttemptId,
    pub is_expired: bool,
}

/// Result of the "check active session" call.
///
/// The two halves are independent: the server may report an active session,
/// a list of attempts it just auto-submitted because their window elapsed,
/// both, or neither.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionCheck {
    pub active_session: Option<ActiveSession>,
    pub auto_submitted: Vec<AttemptId>,
}

/// Payload for a start call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAttemptRequest {
    pub package_id: PackageId,
    pub category_id: CategoryId,
    pub turn: u32,
    pub record_id: Option<RecordId>,
    /// Full checkpoint, sent as cross-device metadata so a resume from
    /// another browser can reconstruct the same sequencing decision.
    pub checkpoint: CheckpointState,
}

impl StartAttemptRequest {
    /// Build a start request for one prepared category within a checkpoint.
    #[must_use]
    pub fn for_target(checkpoint: &CheckpointState, target: &PreparedCategory) -> Self {
        Self {
            package_id: target.package_id.clone(),
            category_id: target.category_id.clone(),
            turn: target.turn,
            record_id: checkpoint.record_id().cloned(),
            checkpoint: checkpoint.clone(),
        }
    }
}

/// The three authoritative outcomes of a start call.
///
/// One variant per outcome so no fourth case can go unhandled; transport
/// problems are `Err(ApiError)` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartAttemptReply {
    /// A new attempt exists and is live.
    Started(Attempt),
    /// The user already owns a different live attempt; nothing was created.
    ActiveConflict { attempt_id: AttemptId },
    /// The package is in draft or no longer resolves.
    PackageUnavailable,
}

/// Backend contract consumed by the session-continuity services.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Ask the backend whether this user owns an active test session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures or undecodable responses.
    async fn check_active_session(&self) -> Result<SessionCheck, ApiError>;

    /// Begin an attempt for the chosen category.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failures; authoritative rejections are
    /// `Ok` variants of `StartAttemptReply`.
    async fn start_attempt(
        &self,
        request: &StartAttemptRequest,
    ) -> Result<StartAttemptReply, ApiError>;
}
