use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Upper bound for any configured wait, one week
pub const MAX_WAIT_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Bounds for every wait the scenario performs
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReadinessConfig {
    /// Timeout of the post-restart `ready_for_writes` wait
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Timeout of the table-created wait during bootstrap
    #[serde(default = "default_table_create_timeout_secs")]
    pub table_create_timeout_secs: u64,

    /// Extra client-side slack on top of a server-side wait timeout
    #[serde(default = "default_wait_grace_ms")]
    pub wait_grace_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            ready_timeout_secs: default_ready_timeout_secs(),
            table_create_timeout_secs: default_table_create_timeout_secs(),
            wait_grace_ms: default_wait_grace_ms(),
        }
    }
}

impl ReadinessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ready_timeout_secs == 0 {
            return Err(Error::InvalidConfig("ready_timeout_secs must be greater than 0".into()));
        }

        if self.table_create_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "table_create_timeout_secs must be greater than 0".into(),
            ));
        }

        for (name, value) in [
            ("ready_timeout_secs", self.ready_timeout_secs),
            ("table_create_timeout_secs", self.table_create_timeout_secs),
        ] {
            if value > MAX_WAIT_TIMEOUT_SECS {
                return Err(Error::InvalidConfig(format!(
                    "{name} must not exceed {MAX_WAIT_TIMEOUT_SECS}, got {value}"
                )));
            }
        }

        Ok(())
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn table_create_timeout(&self) -> Duration {
        Duration::from_secs(self.table_create_timeout_secs)
    }

    pub fn wait_grace(&self) -> Duration {
        Duration::from_millis(self.wait_grace_ms)
    }
}

fn default_ready_timeout_secs() -> u64 {
    10
}
fn default_table_create_timeout_secs() -> u64 {
    60
}
fn default_wait_grace_ms() -> u64 {
    2_000
}
