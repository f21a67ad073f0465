mod attempt;
mod checkpoint;
mod ids;

pub use attempt::Attempt;
pub use checkpoint::{CheckpointError, CheckpointState, PreparedCategory};
pub use ids::{AttemptId, CategoryId, PackageId, RecordId, SessionToken};
