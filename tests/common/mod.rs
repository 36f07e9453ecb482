use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use replica_recovery::DataDir;
use replica_recovery::InfrastructureError;
use replica_recovery::Result;
use replica_recovery::ScenarioConfig;
use replica_recovery::ScenarioFailure;
use replica_recovery::ScenarioOrchestrator;
use replica_recovery::ScenarioReport;
use replica_recovery::ServeOptions;
use replica_recovery::ServerHandle;
use replica_recovery::ServerName;
use replica_recovery::SimFault;
use replica_recovery::SimulatedCluster;
use replica_recovery::Supervisor;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Rows loaded by failure path runs; enough that backfill outlasts a restart.
pub const FAILURE_PATH_ROWS: u64 = 10_000;

pub fn enable_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The literal scenario: servers `a` and `b`, 16 shards, 100,000 rows.
pub fn literal_config() -> ScenarioConfig {
    ScenarioConfig::default()
}

pub fn config_with_faults(faults: &[SimFault]) -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.workload.total_rows = FAILURE_PATH_ROWS;
    for fault in faults {
        config.simulation = config.simulation.with_fault(*fault);
    }
    config
}

/// A simulated cluster rooted in its own temp dir.
pub struct Harness {
    pub sim: Arc<SimulatedCluster>,
    root: TempDir,
}

impl Harness {
    pub fn new(config: &ScenarioConfig) -> Self {
        let root = tempfile::tempdir().unwrap();
        let sim = Arc::new(SimulatedCluster::new(root.path(), config.simulation.clone()));
        Self { sim, root }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub async fn run(
        &self,
        config: ScenarioConfig,
    ) -> std::result::Result<ScenarioReport, ScenarioFailure> {
        ScenarioOrchestrator::new(config, self.sim.clone(), self.sim.clone())
            .run()
            .await
    }

    /// Teardown ran once and left nothing running.
    pub fn assert_torn_down(&self) {
        assert_eq!(self.sim.release_count(), 1);
        assert!(self.sim.running_servers().is_empty());
        assert!(!self.root().join("a_data").exists());
        assert!(!self.root().join("b_data").exists());
    }
}

/// Delegates to the simulated cluster but fails to release its files.
pub struct FailingRelease(pub Arc<SimulatedCluster>);

#[async_trait]
impl Supervisor for FailingRelease {
    async fn create_data_dir(
        &self,
        server: &ServerName,
    ) -> Result<DataDir> {
        self.0.create_data_dir(server).await
    }

    async fn start_server(
        &self,
        data_dir: &DataDir,
        options: &ServeOptions,
    ) -> Result<ServerHandle> {
        self.0.start_server(data_dir, options).await
    }

    async fn stop_server(
        &self,
        server: &mut ServerHandle,
        timeout: Duration,
    ) -> Result<()> {
        self.0.stop_server(server, timeout).await
    }

    fn force_stop(
        &self,
        server: &ServerHandle,
    ) {
        self.0.force_stop(server)
    }

    async fn release(&self) -> Result<()> {
        self.0.release().await?;
        Err(InfrastructureError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "cluster files still in use",
        ))
        .into())
    }
}

/// Delegates to the simulated cluster and remembers the options of every start.
pub struct RecordingSupervisor {
    inner: Arc<SimulatedCluster>,
    starts: Mutex<Vec<ServeOptions>>,
}

impl RecordingSupervisor {
    pub fn new(inner: Arc<SimulatedCluster>) -> Self {
        Self {
            inner,
            starts: Mutex::new(vec![]),
        }
    }

    pub fn starts(&self) -> Vec<ServeOptions> {
        self.starts.lock().clone()
    }
}

#[async_trait]
impl Supervisor for RecordingSupervisor {
    async fn create_data_dir(
        &self,
        server: &ServerName,
    ) -> Result<DataDir> {
        self.inner.create_data_dir(server).await
    }

    async fn start_server(
        &self,
        data_dir: &DataDir,
        options: &ServeOptions,
    ) -> Result<ServerHandle> {
        self.starts.lock().push(options.clone());
        self.inner.start_server(data_dir, options).await
    }

    async fn stop_server(
        &self,
        server: &mut ServerHandle,
        timeout: Duration,
    ) -> Result<()> {
        self.inner.stop_server(server, timeout).await
    }

    fn force_stop(
        &self,
        server: &ServerHandle,
    ) {
        self.inner.force_stop(server)
    }

    async fn release(&self) -> Result<()> {
        self.inner.release().await
    }
}
