use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Misbehaviour the simulated cluster can be told to exhibit
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SimFault {
    /// Every insert acknowledges one row fewer than it was given
    ShortInsert,
    /// Tables refuse writes while any replica is still backfilling
    WritesBlockedDuringBackfill,
    /// Restarted instances accept connections but never lead a writable shard
    NeverReadyAfterRestart,
    /// Restarted replicas claim to be fully caught up
    BackfillLostOnRestart,
    /// Graceful stops report an unclean exit
    UncleanShutdown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    /// Rows per second a backfilling replica copies from its primary
    #[serde(default = "default_backfill_rows_per_sec")]
    pub backfill_rows_per_sec: u64,

    /// Delay between starting an instance and it accepting connections
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,

    /// Poll interval of the simulated wait primitive
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub faults: Vec<SimFault>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            backfill_rows_per_sec: default_backfill_rows_per_sec(),
            startup_delay_ms: default_startup_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            faults: vec![],
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backfill_rows_per_sec == 0 {
            return Err(Error::InvalidConfig(
                "backfill_rows_per_sec must be greater than 0".into(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig("poll_interval_ms must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn has_fault(
        &self,
        fault: SimFault,
    ) -> bool {
        self.faults.contains(&fault)
    }

    pub fn with_fault(
        mut self,
        fault: SimFault,
    ) -> Self {
        if !self.has_fault(fault) {
            self.faults.push(fault);
        }
        self
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_backfill_rows_per_sec() -> u64 {
    2_000
}
fn default_startup_delay_ms() -> u64 {
    200
}
fn default_poll_interval_ms() -> u64 {
    50
}
