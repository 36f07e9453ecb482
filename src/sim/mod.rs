//! In-process stand-in for a two-server database cluster.
//!
//! [`SimulatedCluster`] implements both [`Supervisor`] and [`Connector`] so the
//! scenario can run without external processes. Server state lives in real
//! data directories, survives restarts, and backfill advances with tokio time,
//! so tests can drive it with a paused clock. [`SimFault`]s make it misbehave
//! in the ways the scenario is meant to detect.
//!
//! [`SimFault`]: crate::SimFault

mod connection;
mod state;
mod store;

pub use connection::*;


use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::time;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

use self::state::Instance;
use self::state::Node;
use self::state::SimState;
use self::store::DataDirState;
use crate::Connection;
use crate::Connector;
use crate::DataDir;
use crate::Endpoint;
use crate::Error;
use crate::InfrastructureError;
use crate::Result;
use crate::ServeOptions;
use crate::ServerHandle;
use crate::ServerName;
use crate::ServerState;
use crate::SimFault;
use crate::SimulationConfig;
use crate::Supervisor;

const LOCALHOST: &str = "127.0.0.1";

pub struct SimulatedCluster {
    root: PathBuf,
    state: Arc<Mutex<SimState>>,
    /// Keeps an owned scratch root alive for the cluster's lifetime
    _scratch: Option<TempDir>,
}

impl SimulatedCluster {
    /// Cluster whose data directories live under `root`.
    pub fn new(
        root: impl Into<PathBuf>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            root: root.into(),
            state: Arc::new(Mutex::new(SimState::new(config))),
            _scratch: None,
        }
    }

    /// Cluster rooted in a fresh temporary directory, removed on drop.
    pub fn in_temp_dir(config: SimulationConfig) -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("replica-recovery").tempdir()?;
        let mut cluster = Self::new(scratch.path(), config);
        cluster._scratch = Some(scratch);
        Ok(cluster)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Servers with a running instance, in name order.
    pub fn running_servers(&self) -> Vec<ServerName> {
        self.state
            .lock()
            .nodes
            .iter()
            .filter(|(_, n)| n.running.is_some())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().release_count
    }

    /// Instances started so far, across all data directories.
    pub fn start_count(&self) -> usize {
        self.state.lock().start_count
    }
}

#[async_trait]
impl Supervisor for SimulatedCluster {
    async fn create_data_dir(
        &self,
        server: &ServerName,
    ) -> Result<DataDir> {
        let path = self.root.join(format!("{server}_data"));
        let mut state = self.state.lock();
        if state.nodes.contains_key(server) {
            return Err(InfrastructureError::ServerStart {
                server: server.clone(),
                reason: format!("data directory {} already exists", path.display()),
            }
            .into());
        }
        std::fs::create_dir_all(&path)?;
        state.nodes.insert(
            server.clone(),
            Node {
                path: path.clone(),
                state: DataDirState::default(),
                running: None,
                starts: 0,
            },
        );
        debug!(%server, path = %path.display(), "simulated data directory created");

        Ok(DataDir {
            server: server.clone(),
            path,
        })
    }

    async fn start_server(
        &self,
        data_dir: &DataDir,
        options: &ServeOptions,
    ) -> Result<ServerHandle> {
        let server = &data_dir.server;
        let startup_error = |reason: String| {
            Error::from(InfrastructureError::ServerStart {
                server: server.clone(),
                reason,
            })
        };

        let (handle, startup_delay) = {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.advance(now);
            let startup_delay = state.config.startup_delay();
            let ready_at = now
                .checked_add(startup_delay)
                .ok_or_else(|| startup_error(format!("startup delay {startup_delay:?} is out of range")))?;
            let port = state.next_port;
            let node = state
                .nodes
                .get_mut(server)
                .ok_or_else(|| startup_error(format!("unknown data directory {}", data_dir.path.display())))?;
            if node.running.is_some() {
                return Err(startup_error("an instance is already running on this data directory".into()));
            }

            node.state = DataDirState::load(&node.path)?;
            node.starts += 1;
            let instance = Instance {
                id: format!("{server}-{}", nanoid::nanoid!(8)),
                endpoint: Endpoint {
                    host: LOCALHOST.into(),
                    port,
                },
                ready_at,
                restarted: node.starts > 1,
            };
            let handle = ServerHandle {
                id: instance.id.clone(),
                name: server.clone(),
                data_dir: data_dir.clone(),
                endpoint: instance.endpoint.clone(),
                state: ServerState::Starting,
            };
            node.running = Some(instance);
            state.next_port += 1;
            state.start_count += 1;
            (handle, startup_delay)
        };

        info!(
            %server,
            instance = %handle.id,
            endpoint = %handle.endpoint,
            command = ?options.command_prefix,
            serve_options = ?options.extra_options,
            "simulated server starting"
        );

        if !options.wait_until_ready {
            return Ok(handle);
        }
        if startup_delay > options.startup_timeout {
            self.force_stop(&handle);
            return Err(startup_error(format!(
                "not ready within {:?}",
                options.startup_timeout
            )));
        }
        time::sleep(startup_delay).await;

        Ok(ServerHandle {
            state: ServerState::Ready,
            ..handle
        })
    }

    async fn stop_server(
        &self,
        server: &mut ServerHandle,
        timeout: Duration,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.advance(Instant::now());
        let unclean = state.has_fault(SimFault::UncleanShutdown);
        let node = state
            .nodes
            .get_mut(&server.name)
            .filter(|n| n.running.as_ref().is_some_and(|i| i.id == server.id))
            .ok_or_else(|| Error::from(InfrastructureError::ServerNotRunning(server.name.clone())))?;

        node.state.save(&node.path)?;
        node.running = None;
        server.state = ServerState::Stopped;
        debug!(server = %server.name, instance = %server.id, ?timeout, "simulated server stopped");

        if unclean {
            return Err(InfrastructureError::UncleanExit {
                server: server.name.clone(),
                code: 1,
            }
            .into());
        }
        Ok(())
    }

    fn force_stop(
        &self,
        server: &ServerHandle,
    ) {
        let mut state = self.state.lock();
        if let Some(node) = state
            .nodes
            .get_mut(&server.name)
            .filter(|n| n.running.as_ref().is_some_and(|i| i.id == server.id))
        {
            node.running = None;
            warn!(server = %server.name, instance = %server.id, "simulated server killed");
        }
    }

    async fn release(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.release_count += 1;
        let mut first_error = None;
        for (name, node) in &state.nodes {
            if node.running.is_some() {
                warn!(server = %name, "releasing data directory of a running server");
            }
            if let Err(e) = std::fs::remove_dir_all(&node.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connector for SimulatedCluster {
    async fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Box<dyn Connection>> {
        let state = self.state.lock();
        let now = Instant::now();
        let (server, instance) = state
            .nodes
            .iter()
            .find_map(|(name, node)| {
                node.running
                    .as_ref()
                    .filter(|i| &i.endpoint == endpoint && now >= i.ready_at)
                    .map(|i| (name.clone(), i.id.clone()))
            })
            .ok_or_else(|| {
                Error::from(InfrastructureError::Connect {
                    endpoint: endpoint.to_string(),
                    reason: "connection refused".into(),
                })
            })?;
        debug!(%server, %instance, %endpoint, "connected");

        Ok(Box::new(SimConnection::new(self.state.clone(), server, instance)))
    }
}
