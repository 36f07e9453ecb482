//! Configuration management for the replica recovery scenario.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod cluster;
mod readiness;
mod simulation;
mod workload;
pub use cluster::*;
pub use readiness::*;
pub use simulation::*;
pub use workload::*;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix, e.g. `SCENARIO__WORKLOAD__TOTAL_ROWS=5000`
pub const ENV_PREFIX: &str = "SCENARIO";

/// Main configuration container for the scenario
///
/// Combines all component configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct ScenarioConfig {
    /// Server identities, data directories and the process invocation surface
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Table layout and bulk load shape
    #[serde(default)]
    pub workload: WorkloadConfig,
    /// Wait bounds
    #[serde(default)]
    pub readiness: ReadinessConfig,
    /// Behaviour of the in-process simulated cluster
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Debug for ScenarioConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ScenarioConfig")
            .field("cluster", &self.cluster)
            .field("workload", &self.workload)
            .finish()
    }
}

impl ScenarioConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `SCENARIO__` prefix (highest priority)
    ///
    /// Callers MUST call `validate()` before using the configuration.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.cluster.validate()?;
        self.workload.validate()?;
        self.readiness.validate()?;
        self.simulation.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
