use std::path::PathBuf;

use clap::Parser;
use replica_recovery::Result;
use replica_recovery::ScenarioConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "replica-recovery")]
#[command(version = "0.1.0")]
#[command(
    about = "Restart a two-server cluster while a new replica backfills and check it recovers",
    long_about = None
)]
pub struct Args {
    /// Configuration file merged over `CONFIG_PATH` and the defaults
    #[arg(short, long)]
    pub config: Option<String>,

    /// Argument of the command used to launch a server, repeat for each
    #[arg(long = "command-prefix")]
    pub command_prefix: Vec<String>,

    /// Extra serve-time option forwarded untouched, repeat for each
    #[arg(long = "serve-option", allow_hyphen_values = true)]
    pub serve_options: Vec<String>,

    /// Parent directory of the server data directories
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    #[arg(long)]
    pub total_rows: Option<u64>,
}

impl Args {
    /// Loads the configuration and lays the command line over it.
    pub fn load_config(&self) -> Result<ScenarioConfig> {
        let mut config = ScenarioConfig::new()?;
        if let Some(path) = &self.config {
            config = config.with_override_config(path)?;
        }

        if !self.command_prefix.is_empty() {
            config.cluster.command_prefix = self.command_prefix.clone();
        }
        if !self.serve_options.is_empty() {
            config.cluster.serve_options = self.serve_options.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            config.cluster.work_dir = Some(work_dir.clone());
        }
        if let Some(total_rows) = self.total_rows {
            config.workload.total_rows = total_rows;
        }

        config.validate()
    }
}
