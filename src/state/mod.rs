//! State tracking for crawl runs
//!
//! This module defines the run state machine and the records a run produces.

mod phase;
mod run;

pub use phase::{RunPhase, StopReason};
pub use run::{CrawlRun, PageResult};

pub(crate) use run::{RunLedger, RunOutcome};
