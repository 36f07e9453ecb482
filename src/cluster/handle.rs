use std::sync::Arc;
use std::time::Duration;

use nanoid::nanoid;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Supervisor;
use crate::DataDir;
use crate::Error;
use crate::InfrastructureError;
use crate::Result;
use crate::ServeOptions;
use crate::ServerHandle;
use crate::ServerName;
use crate::ServerState;

/// Scoped ownership of one logical deployment.
///
/// Every instance started through the handle is stopped by [`teardown`],
/// which runs at most once. A handle dropped before teardown force-stops
/// whatever is still running.
///
/// [`teardown`]: ClusterHandle::teardown
pub struct ClusterHandle {
    id: String,
    supervisor: Arc<dyn Supervisor>,
    data_dirs: Vec<DataDir>,
    /// Every instance ever started, in start order
    servers: Vec<ServerHandle>,
    shutdown_timeout: Duration,
    torn_down: bool,
}

impl ClusterHandle {
    pub fn new(
        supervisor: Arc<dyn Supervisor>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            id: nanoid!(),
            supervisor,
            data_dirs: vec![],
            servers: vec![],
            shutdown_timeout,
            torn_down: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn add_data_dir(
        &mut self,
        server: &ServerName,
    ) -> Result<DataDir> {
        if self.data_dir(server).is_some() {
            return Err(InfrastructureError::ServerStart {
                server: server.clone(),
                reason: "data directory already allocated".into(),
            }
            .into());
        }

        let data_dir = self.supervisor.create_data_dir(server).await?;
        debug!(cluster = %self.id, %server, path = %data_dir.path.display(), "data directory allocated");
        self.data_dirs.push(data_dir.clone());
        Ok(data_dir)
    }

    pub fn data_dir(
        &self,
        server: &ServerName,
    ) -> Option<&DataDir> {
        self.data_dirs.iter().find(|d| &d.server == server)
    }

    /// Starts a fresh instance of `server` on its existing data directory.
    pub async fn start(
        &mut self,
        server: &ServerName,
        options: &ServeOptions,
    ) -> Result<&ServerHandle> {
        if self.torn_down {
            return Err(InfrastructureError::ServerStart {
                server: server.clone(),
                reason: "cluster already torn down".into(),
            }
            .into());
        }
        if self.server(server).is_some() {
            return Err(InfrastructureError::ServerStart {
                server: server.clone(),
                reason: "an instance is already running".into(),
            }
            .into());
        }
        let data_dir = self.data_dir(server).cloned().ok_or_else(|| {
            Error::from(InfrastructureError::ServerStart {
                server: server.clone(),
                reason: "no data directory allocated".into(),
            })
        })?;

        let handle = self.supervisor.start_server(&data_dir, options).await?;
        info!(cluster = %self.id, %server, instance = %handle.id, endpoint = %handle.endpoint, "server started");
        self.servers.push(handle);
        Ok(&self.servers[self.servers.len() - 1])
    }

    /// Gracefully stops the running instance of `server`.
    pub async fn stop(
        &mut self,
        server: &ServerName,
    ) -> Result<()> {
        let supervisor = self.supervisor.clone();
        let timeout = self.shutdown_timeout;
        let handle = self
            .servers
            .iter_mut()
            .rev()
            .find(|s| &s.name == server && s.is_running())
            .ok_or_else(|| Error::from(InfrastructureError::ServerNotRunning(server.clone())))?;

        supervisor.stop_server(handle, timeout).await?;
        info!(cluster = %self.id, %server, instance = %handle.id, "server stopped");
        Ok(())
    }

    /// The running instance of `server`, if any.
    pub fn server(
        &self,
        server: &ServerName,
    ) -> Option<&ServerHandle> {
        self.servers.iter().rev().find(|s| &s.name == server && s.is_running())
    }

    pub fn running(&self) -> impl Iterator<Item = &ServerHandle> {
        self.servers.iter().filter(|s| s.is_running())
    }

    /// Every instance started so far, including stopped ones.
    pub fn instances(&self) -> &[ServerHandle] {
        &self.servers
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Stops every running instance and releases the cluster's files.
    ///
    /// Keeps going past individual failures so nothing is left running;
    /// returns the first error seen. Calling it again is a no-op.
    pub async fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        let mut first_error: Option<Error> = None;
        let supervisor = self.supervisor.clone();
        for handle in self.servers.iter_mut().filter(|s| s.is_running()) {
            if let Err(e) = supervisor.stop_server(handle, self.shutdown_timeout).await {
                error!(cluster = %self.id, server = %handle.name, "stop during teardown failed: {}", e);
                if handle.is_running() {
                    supervisor.force_stop(handle);
                    handle.state = ServerState::Stopped;
                }
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = supervisor.release().await {
            error!(cluster = %self.id, "releasing cluster files failed: {}", e);
            first_error.get_or_insert(e);
        }

        info!(cluster = %self.id, instances = self.servers.len(), "cluster torn down");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ClusterHandle {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        for handle in self.servers.iter().filter(|s| s.is_running()) {
            warn!(cluster = %self.id, server = %handle.name, "cluster dropped without teardown, force stopping");
            self.supervisor.force_stop(handle);
        }
    }
}
