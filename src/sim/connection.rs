use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::state::table_not_found;
use super::state::SimState;
use super::store::TableState;
use crate::Connection;
use crate::Durability;
use crate::InfrastructureError;
use crate::InsertResult;
use crate::ReadinessCondition;
use crate::Result;
use crate::Row;
use crate::ServerName;
use crate::ShardDescriptor;
use crate::SimFault;
use crate::StatusDocument;
use crate::TableConfig;
use crate::TableRef;
use crate::WaitOutcome;

/// Client connection bound to one simulated server instance. Queries fail
/// once that instance is stopped, even if the server is started again.
pub struct SimConnection {
    state: Arc<Mutex<SimState>>,
    server: ServerName,
    instance: String,
}

impl SimConnection {
    pub(crate) fn new(
        state: Arc<Mutex<SimState>>,
        server: ServerName,
        instance: String,
    ) -> Self {
        Self {
            state,
            server,
            instance,
        }
    }

    pub fn server(&self) -> &ServerName {
        &self.server
    }

    fn query_error(
        query: &'static str,
        reason: String,
    ) -> crate::Error {
        InfrastructureError::Query { query, reason }.into()
    }
}

#[async_trait]
impl Connection for SimConnection {
    async fn db_create(
        &self,
        db: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let node = state.live_node(&self.server, &self.instance)?;
        if node.state.databases.contains(db) {
            return Err(Self::query_error("db_create", format!("database `{db}` already exists")));
        }
        state.apply_to_running(|catalog| {
            catalog.databases.insert(db.to_string());
        })?;
        debug!(server = %self.server, db, "database created");
        Ok(())
    }

    async fn insert_table_config(
        &self,
        config: &TableConfig,
    ) -> Result<()> {
        let table = config.table_ref();
        let mut state = self.state.lock();
        let node = state.live_node(&self.server, &self.instance)?;
        if !node.state.databases.contains(&config.db) {
            return Err(Self::query_error(
                "table_config",
                format!("database `{}` does not exist", config.db),
            ));
        }
        if node.state.table(&table).is_some() {
            return Err(Self::query_error("table_config", format!("table `{table}` already exists")));
        }
        if config.shards.is_empty() {
            return Err(Self::query_error("table_config", "a table needs at least one shard".into()));
        }

        let created = TableState::new(SimState::new_table_id(), config.clone());
        state.apply_to_running(|catalog| {
            catalog.tables.insert(table.to_string(), created.clone());
        })?;
        debug!(server = %self.server, %table, shards = config.shards.len(), "table created");
        Ok(())
    }

    async fn update_table_shards(
        &self,
        table: &TableRef,
        shards: &[ShardDescriptor],
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.advance(Instant::now());
        let current = state
            .live_node(&self.server, &self.instance)?
            .state
            .table(table)
            .ok_or_else(|| table_not_found(table))?
            .clone();
        if current.config.shards.len() != shards.len() {
            return Err(Self::query_error(
                "table_config",
                format!(
                    "resharding `{table}` from {} to {} shards is not supported",
                    current.config.shards.len(),
                    shards.len()
                ),
            ));
        }

        state.apply_to_running(|catalog| match catalog.table_mut(table) {
            Some(existing) => existing.config.shards = shards.to_vec(),
            None => {
                let mut added = TableState::new(current.id.clone(), current.config.clone());
                added.config.shards = shards.to_vec();
                catalog.databases.insert(table.db.clone());
                catalog.tables.insert(table.to_string(), added);
            }
        })?;
        debug!(server = %self.server, %table, "shard layout replaced");
        Ok(())
    }

    async fn insert(
        &self,
        table: &TableRef,
        rows: Vec<Row>,
        durability: Durability,
    ) -> Result<InsertResult> {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.advance(now);
        state.live_node(&self.server, &self.instance)?;
        state.check_writable(&self.server, table, now)?;

        let Some(first) = rows.first().map(|r| r.value) else {
            return Ok(InsertResult::default());
        };
        let requested = rows.len() as u64;
        let accepted = if state.has_fault(SimFault::ShortInsert) {
            requested - 1
        } else {
            requested
        };
        state.record_insert(&self.server, table, first, accepted)?;

        if durability == Durability::Hard {
            let node = state.live_node_mut(&self.server, &self.instance)?;
            node.state.save(&node.path)?;
        }
        trace!(server = %self.server, %table, requested, accepted, "rows inserted");

        let rejected = requested - accepted;
        Ok(InsertResult {
            inserted: accepted,
            errors: rejected,
            first_error: (rejected > 0).then(|| "write rejected by replica".to_string()),
        })
    }

    async fn wait(
        &self,
        table: &TableRef,
        condition: Option<ReadinessCondition>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome> {
        let condition = condition.unwrap_or(ReadinessCondition::AllReplicasReady);
        let start = Instant::now();
        loop {
            let poll_interval = {
                let mut state = self.state.lock();
                let now = Instant::now();
                state.advance(now);
                state.live_node(&self.server, &self.instance)?;
                let status = state.status(&self.server, table, now)?;
                if condition.is_satisfied_by(&status) {
                    return Ok(WaitOutcome::Ready);
                }
                state.config.poll_interval()
            };

            if timeout.is_some_and(|t| start.elapsed() >= t) {
                return Ok(WaitOutcome::TimedOut);
            }
            time::sleep(poll_interval).await;
        }
    }

    async fn status(
        &self,
        table: &TableRef,
    ) -> Result<StatusDocument> {
        let mut state = self.state.lock();
        let now = Instant::now();
        state.advance(now);
        state.live_node(&self.server, &self.instance)?;
        state.status(&self.server, table, now)
    }
}
