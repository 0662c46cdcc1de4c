//! Concurrent superstep execution and version-gated re-run tracking.
//!
//! The scheduler decides, for a given frontier of nodes, which ones actually
//! need to run this step (a node is skipped if none of the channels it saw
//! last time it ran have changed version), runs the eligible ones concurrently
//! up to a configured limit, and reports back what ran, what was skipped, and
//! the raw [`NodePartial`](crate::node::NodePartial) each node produced.

pub mod scheduler;

pub use scheduler::{Scheduler, SchedulerError, SchedulerState, StepRunResult};
