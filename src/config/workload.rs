use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::TableRef;

/// Table layout and bulk load shape
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkloadConfig {
    #[serde(default = "default_db")]
    pub db: String,

    #[serde(default = "default_table")]
    pub table: String,

    #[serde(default = "default_shard_count")]
    pub shard_count: usize,

    /// Rows written by the bulk loader before replication is expanded
    #[serde(default = "default_total_rows")]
    pub total_rows: u64,

    /// Upper bound of rows per insert request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Size of the padding field of every generated row
    #[serde(default = "default_padding_bytes")]
    pub padding_bytes: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            db: default_db(),
            table: default_table(),
            shard_count: default_shard_count(),
            total_rows: default_total_rows(),
            chunk_size: default_chunk_size(),
            padding_bytes: default_padding_bytes(),
        }
    }
}

impl WorkloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.db.is_empty() || self.table.is_empty() {
            return Err(Error::InvalidConfig("db and table names cannot be empty".into()));
        }

        if self.shard_count == 0 {
            return Err(Error::InvalidConfig("shard_count must be greater than 0".into()));
        }

        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.db.clone(), self.table.clone())
    }
}

fn default_db() -> String {
    "test".to_string()
}
fn default_table() -> String {
    "test".to_string()
}
fn default_shard_count() -> usize {
    16
}
fn default_total_rows() -> u64 {
    100_000
}
fn default_chunk_size() -> u64 {
    1_000
}
fn default_padding_bytes() -> usize {
    100
}
