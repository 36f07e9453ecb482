use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::ServeOptions;
use crate::ServerName;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClusterConfig {
    /// Server that leads every shard and receives the bulk load
    #[serde(default = "default_primary_server")]
    pub primary_server: String,

    /// Server added to the replica set during expansion
    #[serde(default = "default_replica_server")]
    pub replica_server: String,

    /// Parent of the per-server data directories; a temp dir when unset
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Directory for the scenario's own log file; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// How to invoke the server binary, passed through to the supervisor
    #[serde(default)]
    pub command_prefix: Vec<String>,

    /// Serve-time options, passed through to the supervisor
    #[serde(default)]
    pub serve_options: Vec<String>,

    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            primary_server: default_primary_server(),
            replica_server: default_replica_server(),
            work_dir: None,
            log_dir: None,
            command_prefix: vec![],
            serve_options: vec![],
            startup_timeout_ms: default_startup_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.primary_server.trim().is_empty() || self.replica_server.trim().is_empty() {
            return Err(Error::InvalidConfig("server names cannot be empty".into()));
        }

        if self.primary_server == self.replica_server {
            return Err(Error::InvalidConfig(format!(
                "primary_server and replica_server must differ, both are '{}'",
                self.primary_server
            )));
        }

        if self.startup_timeout_ms == 0 {
            return Err(Error::InvalidConfig("startup_timeout_ms must be greater than 0".into()));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(Error::InvalidConfig("shutdown_timeout_ms must be greater than 0".into()));
        }

        if let Some(dir) = &self.work_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::InvalidConfig("work_dir path cannot be empty".into()));
            }
        }

        Ok(())
    }

    pub fn primary(&self) -> ServerName {
        ServerName::new(self.primary_server.clone())
    }

    pub fn replica(&self) -> ServerName {
        ServerName::new(self.replica_server.clone())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Options for every instance the scenario starts.
    pub fn serve_options(&self) -> ServeOptions {
        ServeOptions {
            command_prefix: self.command_prefix.clone(),
            extra_options: self.serve_options.clone(),
            wait_until_ready: true,
            startup_timeout: Duration::from_millis(self.startup_timeout_ms),
        }
    }
}

fn default_primary_server() -> String {
    "a".to_string()
}
fn default_replica_server() -> String {
    "b".to_string()
}
fn default_startup_timeout_ms() -> u64 {
    30_000
}
fn default_shutdown_timeout_ms() -> u64 {
    30_000
}
