//! The crawler pipeline.
//!
//! - [`queue`]: bounded multi-consumer queues with sentinel shutdown
//! - [`orchestrator`]: worker pools and the stage-advancement protocol
//! - one module per stage body: search, dedup, detail, classify

pub(crate) mod classify;
pub mod dedup;
pub(crate) mod detail;
pub mod orchestrator;
pub mod queue;
pub(crate) mod search;
pub mod stats;

pub use dedup::UrlDeduplicator;
pub use orchestrator::{Orchestrator, RunReport, RunRequest, WorkerCounts};
pub use queue::{Message, ProductStream, WorkQueue};
pub use stats::{RunStats, StatsSnapshot};
