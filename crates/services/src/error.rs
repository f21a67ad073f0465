//! Shared error types for the services crate.

use thiserror::Error;

/// Transport-level failures talking to the backend.
///
/// Authoritative rejections (conflict, package unavailable) are not errors;
/// they are modeled as `StartAttemptReply` variants.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("backend request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("backend response could not be decoded: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the attempt-start workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StartError {
    #[error("a start call is already in flight")]
    StartInFlight,
    #[error("an unavailable-package choice is pending")]
    ChoicePending,
    #[error("the overview flow has already finished")]
    FlowFinished,
    #[error(transparent)]
    Api(#[from] ApiError),
}
