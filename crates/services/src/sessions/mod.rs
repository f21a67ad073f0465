mod flow;
mod resolver;
mod sequencer;
mod starter;

// Public API of the session-continuity subsystem.
pub use crate::error::{ApiError, StartError};
pub use flow::{Enter, OverviewFlow, StartPhase};
pub use resolver::{Navigation, ResolveOptions, SessionResolution, SessionResolver};
pub use sequencer::{
    PACKET_NOT_FOUND, Section, SectionStatus, SectionTotals, TotalsMode, classify, is_dead_end,
    pick_next, totals,
};
pub use starter::{AttemptStarter, StartOutcome};
