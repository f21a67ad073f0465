#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod sessions;

pub use exam_core::Clock;

pub use api::{
    ActiveSession, ApiConfig, HttpSessionApi, SessionApi, SessionCheck, StartAttemptReply,
    StartAttemptRequest,
};
pub use error::{ApiError, StartError};

pub use sessions::{
    AttemptStarter, Enter, Navigation, OverviewFlow, ResolveOptions, SessionResolution,
    SessionResolver, StartOutcome, StartPhase,
};
