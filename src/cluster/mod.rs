//! Capability interfaces of the cluster under test.
//!
//! Process supervision and the database client are external collaborators:
//! the scenario only consumes them through these traits. [`ClusterHandle`]
//! owns the server instances a scenario starts and guarantees their release.

mod handle;
pub use handle::*;

#[cfg(test)]
mod handle_test;

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::DataDir;
use crate::Durability;
use crate::Endpoint;
use crate::InsertResult;
use crate::ReadinessCondition;
use crate::Result;
use crate::Row;
use crate::ServeOptions;
use crate::ServerHandle;
use crate::ServerName;
use crate::ShardDescriptor;
use crate::StatusDocument;
use crate::TableConfig;
use crate::TableRef;
use crate::WaitOutcome;

/// Starts and stops server instances bound to persistent data directories.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Allocates the persistent data directory `server` will run on.
    async fn create_data_dir(
        &self,
        server: &ServerName,
    ) -> Result<DataDir>;

    /// Starts a new instance on `data_dir`. Returns once the instance
    /// accepts connections when `options.wait_until_ready` is set.
    async fn start_server(
        &self,
        data_dir: &DataDir,
        options: &ServeOptions,
    ) -> Result<ServerHandle>;

    /// Graceful shutdown that also verifies the instance exited cleanly.
    /// Marks the handle stopped once the instance is gone, even when the
    /// exit was unclean.
    async fn stop_server(
        &self,
        server: &mut ServerHandle,
        timeout: Duration,
    ) -> Result<()>;

    /// Best-effort immediate termination, usable from `Drop`.
    fn force_stop(
        &self,
        server: &ServerHandle,
    );

    /// Releases every file the supervisor allocated for the cluster.
    async fn release(&self) -> Result<()>;
}

/// Opens client connections to a server endpoint.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Box<dyn Connection>>;
}

/// Client connection to one server instance.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    /// Creates a database. Fails if it already exists.
    async fn db_create(
        &self,
        db: &str,
    ) -> Result<()>;

    /// Inserts a table configuration record, which creates the table.
    async fn insert_table_config(
        &self,
        config: &TableConfig,
    ) -> Result<()>;

    /// Replaces the shard list of an existing table configuration record.
    async fn update_table_shards(
        &self,
        table: &TableRef,
        shards: &[ShardDescriptor],
    ) -> Result<()>;

    async fn insert(
        &self,
        table: &TableRef,
        rows: Vec<Row>,
        durability: Durability,
    ) -> Result<InsertResult>;

    /// Server-side blocking wait. `None` condition means the server's
    /// default; `None` timeout means no server-side bound.
    async fn wait(
        &self,
        table: &TableRef,
        condition: Option<ReadinessCondition>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome>;

    async fn status(
        &self,
        table: &TableRef,
    ) -> Result<StatusDocument>;
}
