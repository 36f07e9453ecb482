use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::Phase;
use super::PhaseRecord;
use super::ScenarioFailure;
use super::ScenarioReport;
use crate::dump_status;
use crate::utils::ScopedTimer;
use crate::BulkLoader;
use crate::ClusterHandle;
use crate::Connection;
use crate::Connector;
use crate::Error;
use crate::InfrastructureError;
use crate::ReadinessCondition;
use crate::ReadinessEvaluator;
use crate::Result;
use crate::ScenarioConfig;
use crate::ServerName;
use crate::StatusDocument;
use crate::Supervisor;
use crate::TableRef;
use crate::TopologyController;

/// Error raised inside a phase, tagged with that phase.
struct PhaseError {
    phase: Phase,
    error: Error,
}

/// Bookkeeping of one run, filled in as phases complete.
struct Progress {
    started: Instant,
    /// Phase most recently entered
    current: Phase,
    phases: Vec<PhaseRecord>,
    last_status: Option<StatusDocument>,
}

impl Progress {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            current: Phase::Provision,
            phases: vec![],
            last_status: None,
        }
    }

    /// Runs one phase, narrating its start and end and recording how long it took.
    async fn phase<T>(
        &mut self,
        phase: Phase,
        work: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, PhaseError> {
        info!("[{}] starting ({:.2}s)", phase, self.started.elapsed().as_secs_f64());
        self.current = phase;
        let timer = ScopedTimer::new(phase.as_str());
        let result = work.await;
        let elapsed = timer.elapsed();

        match result {
            Ok(value) => {
                info!(
                    "[{}] done in {:.2}s ({:.2}s)",
                    phase,
                    elapsed.as_secs_f64(),
                    self.started.elapsed().as_secs_f64()
                );
                self.phases.push(PhaseRecord { phase, elapsed });
                Ok(value)
            }
            Err(error) => {
                error!("[{}] failed after {:.2}s: {}", phase, elapsed.as_secs_f64(), error);
                Err(PhaseError { phase, error })
            }
        }
    }

    fn observe(
        &mut self,
        status: &StatusDocument,
    ) {
        self.last_status = Some(status.clone());
    }
}

/// What the phases hand back on success.
struct Outcome {
    rows_loaded: u64,
    expansion_status: StatusDocument,
    final_status: StatusDocument,
}

/// Drives the replica recovery scenario against a cluster reached through
/// the given supervisor and connector.
///
/// Every run owns a fresh [`ClusterHandle`] and tears it down before
/// returning, whichever phase failed.
pub struct ScenarioOrchestrator {
    config: ScenarioConfig,
    supervisor: Arc<dyn Supervisor>,
    connector: Arc<dyn Connector>,
    table: TableRef,
    primary: ServerName,
    replica: ServerName,
}

impl ScenarioOrchestrator {
    pub fn new(
        config: ScenarioConfig,
        supervisor: Arc<dyn Supervisor>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let table = config.workload.table_ref();
        let primary = config.cluster.primary();
        let replica = config.cluster.replica();
        Self {
            config,
            supervisor,
            connector,
            table,
            primary,
            replica,
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub async fn run(&self) -> std::result::Result<ScenarioReport, ScenarioFailure> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Self::run), but abandons the remaining phases once
    /// `shutdown` completes. Teardown still runs and the run fails with
    /// [`Error::Interrupted`] in the phase that was cut short.
    pub async fn run_until(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> std::result::Result<ScenarioReport, ScenarioFailure> {
        let mut progress = Progress::new();
        let mut cluster = ClusterHandle::new(self.supervisor.clone(), self.config.cluster.shutdown_timeout());
        info!(cluster = %cluster.id(), table = %self.table, "replica recovery scenario starting");

        let outcome = tokio::select! {
            biased;
            _ = shutdown => None,
            outcome = self.execute(&mut cluster, &mut progress) => Some(outcome),
        };
        let outcome = match outcome {
            Some(outcome) => outcome,
            None => {
                warn!("[{}] interrupted, tearing down", progress.current);
                Err(PhaseError {
                    phase: progress.current,
                    error: Error::Interrupted,
                })
            }
        };
        let teardown = progress.phase(Phase::Teardown, cluster.teardown()).await;
        let total_elapsed = progress.started.elapsed();

        let (phase, error, teardown_error) = match (outcome, teardown) {
            (Ok(outcome), Ok(())) => {
                info!("scenario passed in {:.2}s", total_elapsed.as_secs_f64());
                return Ok(ScenarioReport {
                    phases: progress.phases,
                    rows_loaded: outcome.rows_loaded,
                    expansion_status: outcome.expansion_status,
                    final_status: outcome.final_status,
                    total_elapsed,
                });
            }
            (Ok(_), Err(teardown)) => (teardown.phase, teardown.error, None),
            (Err(failed), Ok(())) => (failed.phase, failed.error, None),
            (Err(failed), Err(teardown)) => {
                warn!("teardown after failed {} also failed: {}", failed.phase, teardown.error);
                (failed.phase, failed.error, Some(teardown.error))
            }
        };

        let last_status = error.status_document().cloned().or(progress.last_status);
        match &last_status {
            Some(status) => dump_status(status, &format!("scenario failed during {phase}")),
            None => error!("scenario failed during {phase}; no table status was observed"),
        }

        Err(ScenarioFailure {
            phase,
            error,
            teardown_error,
            last_status,
        })
    }

    async fn execute(
        &self,
        cluster: &mut ClusterHandle,
        progress: &mut Progress,
    ) -> std::result::Result<Outcome, PhaseError> {
        let readiness = ReadinessEvaluator::new(self.config.readiness.wait_grace());
        let topology = TopologyController::new(
            self.table.clone(),
            self.primary.clone(),
            self.config.readiness.table_create_timeout(),
            readiness,
        );

        progress.phase(Phase::Provision, self.provision(cluster)).await?;

        let conn = progress
            .phase(Phase::Bootstrap, self.bootstrap(cluster, &topology))
            .await?;

        let summary = progress
            .phase(Phase::Load, async {
                BulkLoader::from_config(&self.config.workload)?
                    .load(conn.as_ref(), &self.table, self.config.workload.total_rows)
                    .await
            })
            .await?;

        let expansion_status = progress
            .phase(Phase::ExpandReplication, self.expand(conn.as_ref(), &topology))
            .await?;
        progress.observe(&expansion_status);
        drop(conn);

        progress.phase(Phase::Restart, self.restart(cluster)).await?;

        let primary_conn = progress
            .phase(
                Phase::PostRestartAvailability,
                self.await_availability(cluster, &readiness),
            )
            .await?;

        let final_status = progress
            .phase(Phase::BackfillNotFinished, self.check_backfill(primary_conn.as_ref()))
            .await?;
        progress.observe(&final_status);

        Ok(Outcome {
            rows_loaded: summary.rows,
            expansion_status,
            final_status,
        })
    }

    async fn provision(
        &self,
        cluster: &mut ClusterHandle,
    ) -> Result<()> {
        let options = self.config.cluster.serve_options();
        for server in [&self.primary, &self.replica] {
            cluster.add_data_dir(server).await?;
        }
        for server in [&self.primary, &self.replica] {
            cluster.start(server, &options).await?;
        }
        Ok(())
    }

    async fn bootstrap(
        &self,
        cluster: &ClusterHandle,
        topology: &TopologyController,
    ) -> Result<Box<dyn Connection>> {
        let conn = self.connect(cluster, &self.primary).await?;
        topology
            .create_table(
                conn.as_ref(),
                self.config.workload.shard_count,
                std::slice::from_ref(&self.primary),
            )
            .await?;
        Ok(conn)
    }

    async fn expand(
        &self,
        conn: &dyn Connection,
        topology: &TopologyController,
    ) -> Result<StatusDocument> {
        let replicas = [self.primary.clone(), self.replica.clone()];
        let status = topology
            .reconfigure(conn, self.config.workload.shard_count, &replicas)
            .await?;

        if !status.ready_for_writes() {
            return Err(Error::assertion(
                format!(
                    "{} is not ready_for_writes right after adding {} as a replica",
                    self.table, self.replica
                ),
                Some(status),
            ));
        }
        Ok(status)
    }

    /// Stops both servers, checking each exits cleanly, then starts new
    /// instances on the same data directories.
    async fn restart(
        &self,
        cluster: &mut ClusterHandle,
    ) -> Result<()> {
        for server in [&self.primary, &self.replica] {
            cluster.stop(server).await?;
        }
        let options = self.config.cluster.serve_options();
        for server in [&self.primary, &self.replica] {
            cluster.start(server, &options).await?;
        }
        Ok(())
    }

    /// Waits until both restarted servers report the table writable and
    /// returns the connection to the primary.
    async fn await_availability(
        &self,
        cluster: &ClusterHandle,
        readiness: &ReadinessEvaluator,
    ) -> Result<Box<dyn Connection>> {
        let timeout = self.config.readiness.ready_timeout();
        let primary_conn = self.connect(cluster, &self.primary).await?;
        let replica_conn = self.connect(cluster, &self.replica).await?;

        for (server, conn) in [(&self.primary, &primary_conn), (&self.replica, &replica_conn)] {
            readiness
                .wait_for(conn.as_ref(), &self.table, ReadinessCondition::ReadyForWrites, timeout)
                .await?;
            info!(%server, table = %self.table, "ready for writes after restart");
        }
        Ok(primary_conn)
    }

    /// The restarted replica cannot have caught up yet; a table reporting
    /// every replica ready here has lost track of the pending backfill.
    async fn check_backfill(
        &self,
        conn: &dyn Connection,
    ) -> Result<StatusDocument> {
        let status = conn.status(&self.table).await?;
        if status.all_replicas_ready() {
            return Err(Error::assertion(
                format!(
                    "{} reports all_replicas_ready right after restart, backfill to {} cannot have finished",
                    self.table, self.replica
                ),
                Some(status),
            ));
        }
        for (shard, replica) in status.lagging_replicas() {
            info!(shard, server = %replica.server, state = ?replica.state, "replica still catching up");
        }
        Ok(status)
    }

    async fn connect(
        &self,
        cluster: &ClusterHandle,
        server: &ServerName,
    ) -> Result<Box<dyn Connection>> {
        let handle = cluster
            .server(server)
            .ok_or_else(|| Error::from(InfrastructureError::ServerNotRunning(server.clone())))?;
        self.connector.connect(&handle.endpoint).await
    }
}
