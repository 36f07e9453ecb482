use std::collections::BTreeSet;
use std::time::Duration;

use tracing::info;

use crate::uniform_shards;
use crate::Connection;
use crate::Error;
use crate::ReadinessEvaluator;
use crate::Result;
use crate::ServerName;
use crate::ShardDescriptor;
use crate::StatusDocument;
use crate::TableConfig;
use crate::TableRef;

/// Issues the declarative shard/replica layout of the scenario's table.
///
/// Every shard is led by the same designated primary. Server-side
/// rebalancing and backfill triggered by a layout change are only observed,
/// never driven, from here.
#[derive(Debug, Clone)]
pub struct TopologyController {
    table: TableRef,
    primary: ServerName,
    create_timeout: Duration,
    readiness: ReadinessEvaluator,
}

impl TopologyController {
    pub fn new(
        table: TableRef,
        primary: ServerName,
        create_timeout: Duration,
        readiness: ReadinessEvaluator,
    ) -> Self {
        Self {
            table,
            primary,
            create_timeout,
            readiness,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Creates the database and the table, then waits (bounded) until the
    /// server reports the table created. The database must not exist yet.
    pub async fn create_table(
        &self,
        conn: &dyn Connection,
        shard_count: usize,
        replicas: &[ServerName],
    ) -> Result<()> {
        let shards = self.shards(shard_count, replicas)?;
        info!(table = %self.table, shard_count, replicas = ?replicas, "creating table");

        conn.db_create(&self.table.db).await?;
        conn.insert_table_config(&TableConfig {
            db: self.table.db.clone(),
            name: self.table.name.clone(),
            shards,
        })
        .await?;

        self.readiness
            .wait_until(conn, &self.table, None, self.create_timeout)
            .await
    }

    /// Replaces the replica set of every shard and returns the status
    /// document fetched right after. Does not wait for convergence.
    pub async fn reconfigure(
        &self,
        conn: &dyn Connection,
        shard_count: usize,
        replicas: &[ServerName],
    ) -> Result<StatusDocument> {
        let shards = self.shards(shard_count, replicas)?;
        info!(table = %self.table, shard_count, replicas = ?replicas, "reconfiguring table");

        conn.update_table_shards(&self.table, &shards).await?;
        conn.status(&self.table).await
    }

    fn shards(
        &self,
        shard_count: usize,
        replicas: &[ServerName],
    ) -> Result<Vec<ShardDescriptor>> {
        if shard_count == 0 {
            return Err(Error::InvalidConfig("shard_count must be greater than 0".into()));
        }
        if replicas.is_empty() {
            return Err(Error::InvalidConfig("replica set cannot be empty".into()));
        }
        if !replicas.contains(&self.primary) {
            return Err(Error::InvalidConfig(format!(
                "replica set {replicas:?} does not contain primary {}",
                self.primary
            )));
        }
        let distinct: BTreeSet<&ServerName> = replicas.iter().collect();
        if distinct.len() != replicas.len() {
            return Err(Error::InvalidConfig(format!(
                "replica set {replicas:?} lists a server twice"
            )));
        }

        Ok(uniform_shards(shard_count, &self.primary, replicas))
    }
}
