use std::fmt;
use std::time::Duration;

use crate::Error;
use crate::StatusDocument;

/// Named checkpoint of the scenario. Phases run in declaration order and a
/// failing phase aborts the ones after it, except [`Phase::Teardown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Provision,
    Bootstrap,
    Load,
    ExpandReplication,
    Restart,
    PostRestartAvailability,
    BackfillNotFinished,
    Teardown,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Provision => "provision",
            Phase::Bootstrap => "bootstrap",
            Phase::Load => "load",
            Phase::ExpandReplication => "expand-replication",
            Phase::Restart => "restart",
            Phase::PostRestartAvailability => "post-restart-availability",
            Phase::BackfillNotFinished => "backfill-not-finished",
            Phase::Teardown => "teardown",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase: Phase,
    pub elapsed: Duration,
}

/// Outcome of a passing run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub phases: Vec<PhaseRecord>,
    pub rows_loaded: u64,
    /// Status fetched right after the second server joined the replica set
    pub expansion_status: StatusDocument,
    /// Status fetched from the primary once both restarted servers were writable
    pub final_status: StatusDocument,
    pub total_elapsed: Duration,
}

impl ScenarioReport {
    pub fn phase_elapsed(
        &self,
        phase: Phase,
    ) -> Option<Duration> {
        self.phases.iter().find(|r| r.phase == phase).map(|r| r.elapsed)
    }
}

/// A run that stopped at `phase`.
///
/// `error` is always the first failure. A teardown that also failed after an
/// earlier phase is kept in `teardown_error` instead of replacing it.
#[derive(Debug, thiserror::Error)]
#[error("scenario failed during {phase}: {error}")]
pub struct ScenarioFailure {
    pub phase: Phase,
    #[source]
    pub error: Error,
    pub teardown_error: Option<Error>,
    /// Most recent table status seen before the failure
    pub last_status: Option<StatusDocument>,
}
