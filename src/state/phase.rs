//! Run phase definitions for the crawl state machine
//!
//! A run moves strictly forward:
//! `Seeding -> Running -> Draining(reason) -> Sealed`.

use serde::Serialize;
use std::fmt;

/// Why the control loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The run fetched as many pages as it was allowed to
    PageBudget,

    /// The run deadline passed
    Deadline,

    /// Too many pages failed every retry
    ErrorBudget,

    /// Nothing left to visit
    FrontierExhausted,

    /// Single mode stops after its one fetch, successful or not
    SingleModeComplete,

    /// The native engine ran out of pages on its own
    EngineExhausted,
}

impl StopReason {
    /// Returns true if the run was cut short rather than finishing its work
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Deadline | Self::ErrorBudget)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageBudget => "page_budget",
            Self::Deadline => "deadline",
            Self::ErrorBudget => "error_budget",
            Self::FrontierExhausted => "frontier_exhausted",
            Self::SingleModeComplete => "single_mode_complete",
            Self::EngineExhausted => "engine_exhausted",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The phase a crawl run is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Request validated, frontier and counters being set up
    Seeding,

    /// The control loop is fetching pages
    Running,

    /// The loop stopped; aggregates are being finalized
    Draining(StopReason),

    /// The run is immutable and handed to the caller
    Sealed,
}

impl RunPhase {
    /// Returns true if `next` is a legal successor of this phase
    pub fn can_transition_to(&self, next: &RunPhase) -> bool {
        matches!(
            (self, next),
            (Self::Seeding, Self::Running)
                | (Self::Running, Self::Draining(_))
                | (Self::Draining(_), Self::Sealed)
        )
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seeding => f.write_str("seeding"),
            Self::Running => f.write_str("running"),
            Self::Draining(reason) if reason.is_aborted() => write!(f, "draining(aborted: {})", reason),
            Self::Draining(reason) => write!(f, "draining(success: {})", reason),
            Self::Sealed => f.write_str("sealed"),
        }
    }
}
