use std::collections::BTreeMap;
use std::path::PathBuf;

use nanoid::nanoid;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::store::DataDirState;
use super::store::TableState;
use crate::Endpoint;
use crate::InfrastructureError;
use crate::ReplicaState;
use crate::ReplicaStatus;
use crate::Result;
use crate::ServerName;
use crate::ShardStatus;
use crate::SimFault;
use crate::SimulationConfig;
use crate::StatusDocument;
use crate::TableReadiness;
use crate::TableRef;

pub(crate) const FIRST_PORT: u16 = 28015;

#[derive(Debug)]
pub(crate) struct Instance {
    pub(crate) id: String,
    pub(crate) endpoint: Endpoint,
    pub(crate) ready_at: Instant,
    /// Started on a data directory that had been started before
    pub(crate) restarted: bool,
}

/// A data directory and the instance currently running on it, if any.
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) path: PathBuf,
    pub(crate) state: DataDirState,
    pub(crate) running: Option<Instance>,
    pub(crate) starts: u32,
}

impl Node {
    fn is_ready(
        &self,
        now: Instant,
    ) -> bool {
        self.running.as_ref().is_some_and(|i| now >= i.ready_at)
    }
}

/// Shared model behind every simulated server and connection.
#[derive(Debug)]
pub(crate) struct SimState {
    pub(crate) config: SimulationConfig,
    pub(crate) nodes: BTreeMap<ServerName, Node>,
    pub(crate) next_port: u16,
    pub(crate) start_count: usize,
    pub(crate) release_count: usize,
    last_advance: Instant,
    /// Fractional rows of backfill budget carried between advances
    credit: f64,
}

impl SimState {
    pub(crate) fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            nodes: BTreeMap::new(),
            next_port: FIRST_PORT,
            start_count: 0,
            release_count: 0,
            last_advance: Instant::now(),
            credit: 0.0,
        }
    }

    pub(crate) fn has_fault(
        &self,
        fault: SimFault,
    ) -> bool {
        self.config.has_fault(fault)
    }

    /// The node `server` if `instance` is still the one running on it.
    pub(crate) fn live_node(
        &self,
        server: &ServerName,
        instance: &str,
    ) -> Result<&Node> {
        self.nodes
            .get(server)
            .filter(|n| n.running.as_ref().is_some_and(|i| i.id == instance))
            .ok_or_else(|| connection_closed(server))
    }

    pub(crate) fn live_node_mut(
        &mut self,
        server: &ServerName,
        instance: &str,
    ) -> Result<&mut Node> {
        self.nodes
            .get_mut(server)
            .filter(|n| n.running.as_ref().is_some_and(|i| i.id == instance))
            .ok_or_else(|| connection_closed(server))
    }

    /// Applies `mutate` to the catalog of every running server and persists it.
    pub(crate) fn apply_to_running(
        &mut self,
        mutate: impl Fn(&mut DataDirState),
    ) -> Result<()> {
        for (name, node) in self.nodes.iter_mut().filter(|(_, n)| n.running.is_some()) {
            mutate(&mut node.state);
            node.state.save(&node.path)?;
            trace!(server = %name, "catalog persisted");
        }
        Ok(())
    }

    pub(crate) fn new_table_id() -> String {
        nanoid!()
    }

    /// Whether the primary of `shard` currently accepts writes.
    fn primary_writable(
        &self,
        table: &TableState,
        shard: usize,
        now: Instant,
    ) -> bool {
        let Some(primary) = table.primary(shard).and_then(|p| self.nodes.get(p)) else {
            return false;
        };
        if !primary.is_ready(now) {
            return false;
        }
        let restarted = primary.running.as_ref().is_some_and(|i| i.restarted);
        !(restarted && self.has_fault(SimFault::NeverReadyAfterRestart))
    }

    /// Rows the primary of `shard` holds for `table`, if it is reachable.
    fn primary_rows(
        &self,
        table: &TableRef,
        view: &TableState,
        shard: usize,
        now: Instant,
    ) -> Option<u64> {
        let primary = self.nodes.get(view.primary(shard)?)?;
        if !primary.is_ready(now) {
            return None;
        }
        primary.state.table(table)?.rows.get(shard).copied()
    }

    fn replica_state(
        &self,
        table: &TableRef,
        view: &TableState,
        shard: usize,
        server: &ServerName,
        now: Instant,
    ) -> ReplicaState {
        let Some(node) = self.nodes.get(server).filter(|n| n.is_ready(now)) else {
            return ReplicaState::Disconnected;
        };
        if view.primary(shard) == Some(server) {
            if self.primary_writable(view, shard, now) {
                return ReplicaState::Ready;
            }
            return ReplicaState::Transitioning;
        }
        let restarted = node.running.as_ref().is_some_and(|i| i.restarted);
        if restarted && self.has_fault(SimFault::BackfillLostOnRestart) {
            return ReplicaState::Ready;
        }
        let Some(primary_rows) = self.primary_rows(table, view, shard, now) else {
            return ReplicaState::Transitioning;
        };
        let held = node
            .state
            .table(table)
            .and_then(|t| t.rows.get(shard).copied())
            .unwrap_or(0);
        if held < primary_rows {
            ReplicaState::Backfilling
        } else {
            ReplicaState::Ready
        }
    }

    /// Status of `table` as reported by `server`.
    pub(crate) fn status(
        &self,
        server: &ServerName,
        table: &TableRef,
        now: Instant,
    ) -> Result<StatusDocument> {
        let view = self
            .nodes
            .get(server)
            .and_then(|n| n.state.table(table))
            .ok_or_else(|| table_not_found(table))?;

        let shards: Vec<ShardStatus> = view
            .config
            .shards
            .iter()
            .enumerate()
            .map(|(i, descriptor)| ShardStatus {
                primary_replicas: if self.primary_writable(view, i, now) {
                    vec![descriptor.primary_replica.clone()]
                } else {
                    vec![]
                },
                replicas: descriptor
                    .replicas
                    .iter()
                    .map(|r| ReplicaStatus {
                        server: r.clone(),
                        state: self.replica_state(table, view, i, r, now),
                    })
                    .collect(),
            })
            .collect();

        let primaries_writable = (0..shards.len()).all(|i| self.primary_writable(view, i, now));
        let backfilling = shards
            .iter()
            .flat_map(|s| s.replicas.iter())
            .any(|r| r.state == ReplicaState::Backfilling);
        let ready_for_writes =
            primaries_writable && !(backfilling && self.has_fault(SimFault::WritesBlockedDuringBackfill));
        let all_replicas_ready = ready_for_writes
            && shards
                .iter()
                .flat_map(|s| s.replicas.iter())
                .all(|r| r.state == ReplicaState::Ready);
        let ready_for_outdated_reads = shards
            .iter()
            .all(|s| s.replicas.iter().any(|r| r.state != ReplicaState::Disconnected));

        Ok(StatusDocument {
            db: table.db.clone(),
            name: table.name.clone(),
            id: view.id.clone(),
            status: TableReadiness {
                ready_for_outdated_reads,
                ready_for_reads: ready_for_writes,
                ready_for_writes,
                all_replicas_ready,
            },
            shards,
        })
    }

    /// Checks that `table`, as seen by `server`, accepts writes.
    pub(crate) fn check_writable(
        &self,
        server: &ServerName,
        table: &TableRef,
        now: Instant,
    ) -> Result<()> {
        let status = self.status(server, table, now)?;
        if status.ready_for_writes() {
            return Ok(());
        }
        Err(InfrastructureError::Query {
            query: "insert",
            reason: format!("table `{table}` is not available for writes"),
        }
        .into())
    }

    /// Records `count` new rows on the primaries of `table`, round-robin over
    /// shards starting at the shard of `first_value`.
    pub(crate) fn record_insert(
        &mut self,
        server: &ServerName,
        table: &TableRef,
        first_value: u64,
        count: u64,
    ) -> Result<()> {
        let view = self
            .nodes
            .get(server)
            .and_then(|n| n.state.table(table))
            .ok_or_else(|| table_not_found(table))?;
        let shard_count = view.config.shards.len() as u64;
        let primaries: Vec<ServerName> = view.config.shards.iter().map(|s| s.primary_replica.clone()).collect();

        for offset in 0..count {
            let shard = ((first_value + offset) % shard_count) as usize;
            let rows = self
                .nodes
                .get_mut(&primaries[shard])
                .and_then(|n| n.state.table_mut(table))
                .and_then(|t| t.rows.get_mut(shard))
                .ok_or_else(|| table_not_found(table))?;
            *rows += 1;
        }
        Ok(())
    }

    /// Moves simulated time forward to `now`, copying rows from primaries to
    /// lagging replicas within the backfill budget. Shards are served in
    /// order; a shard only starts once the ones before it are caught up.
    pub(crate) fn advance(
        &mut self,
        now: Instant,
    ) {
        let elapsed = now.saturating_duration_since(self.last_advance);
        self.last_advance = now;
        self.credit += elapsed.as_secs_f64() * self.config.backfill_rows_per_sec as f64;

        let mut plan: Vec<(ServerName, TableRef, usize, u64)> = vec![];
        for (name, node) in self.nodes.iter().filter(|(_, n)| n.is_ready(now)) {
            for table_state in node.state.tables.values() {
                let table = table_state.config.table_ref();
                for (shard, descriptor) in table_state.config.shards.iter().enumerate() {
                    if &descriptor.primary_replica == name || !descriptor.replicas.contains(name) {
                        continue;
                    }
                    let Some(primary_rows) = self.primary_rows(&table, table_state, shard, now) else {
                        continue;
                    };
                    let held = table_state.rows.get(shard).copied().unwrap_or(0);
                    if held < primary_rows {
                        plan.push((name.clone(), table.clone(), shard, primary_rows - held));
                    }
                }
            }
        }

        if plan.is_empty() {
            self.credit = 0.0;
            return;
        }

        let mut budget = self.credit.floor() as u64;
        self.credit -= budget as f64;
        for (server, table, shard, missing) in plan {
            if budget == 0 {
                break;
            }
            let copied = missing.min(budget);
            if let Some(rows) = self
                .nodes
                .get_mut(&server)
                .and_then(|n| n.state.table_mut(&table))
                .and_then(|t| t.rows.get_mut(shard))
            {
                *rows += copied;
                budget -= copied;
                trace!(%server, %table, shard, copied, "backfill progress");
            }
        }
        if budget > 0 {
            debug!(left = budget, "backfill caught up");
            self.credit = 0.0;
        }
    }
}

pub(crate) fn table_not_found(table: &TableRef) -> crate::Error {
    InfrastructureError::Query {
        query: "table",
        reason: format!("table `{table}` does not exist"),
    }
    .into()
}

fn connection_closed(server: &ServerName) -> crate::Error {
    InfrastructureError::Query {
        query: "connection",
        reason: format!("connection to {server} is closed"),
    }
    .into()
}
