use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Logical server identity used in shard descriptors and status documents.
///
/// A name survives restarts: every instance started on the same data
/// directory answers to the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerName(String);

impl ServerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerName {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Starting,
    Ready,
    Stopped,
}

/// Persistent directory a server instance is bound to. Owned by the
/// supervisor; the orchestrator never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    pub server: ServerName,
    pub path: PathBuf,
}

/// Pass-through options for launching a server instance.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// argv prefix used to invoke the server binary
    pub command_prefix: Vec<String>,

    /// Extra serve-time flags, forwarded untouched
    pub extra_options: Vec<String>,

    /// Block in `start_server` until the instance accepts connections
    pub wait_until_ready: bool,

    pub startup_timeout: Duration,
}

/// One server instance. Stopping it does not release its data directory;
/// a new handle may be started on the same directory later.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    /// Unique per instance, distinct across restarts
    pub id: String,
    pub name: ServerName,
    pub data_dir: DataDir,
    pub endpoint: Endpoint,
    pub state: ServerState,
}

impl ServerHandle {
    pub fn is_running(&self) -> bool {
        self.state != ServerState::Stopped
    }
}
