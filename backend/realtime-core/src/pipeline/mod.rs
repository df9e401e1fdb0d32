//! Pipeline status tracking for a submitted query.
//!
//! A run moves through `routing → drafting → verifying → delivered`, or ends
//! `failed`. Two sources drive it:
//!
//! - local optimistic timers that step through the first three phases while the
//!   query's response is pending ([`PipelineDriver`])
//! - authoritative `pipeline_update` frames for the same question, which may
//!   move the current phase forward but never record phases out of order
//!
//! [`PipelineTracker`] is the synchronous state machine; [`PipelineDriver`]
//! owns the timers and wires the tracker to the registry and connection.

mod driver;
mod phase;
mod tracker;

pub use driver::PipelineDriver;
pub use phase::{Phase, PhaseRecord, PhaseStatus};
pub use tracker::{PipelineSnapshot, PipelineTracker, RunId, RunOutcome};
