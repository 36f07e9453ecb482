use std::cmp::min;

use tokio::time::Instant;
use tracing::debug;
use tracing::info;

use crate::Connection;
use crate::Durability;
use crate::Error;
use crate::Result;
use crate::Row;
use crate::TableRef;
use crate::WorkloadConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows: u64,
    pub chunks: u64,
}

/// Writes synthetic fixture rows in bounded chunks with soft durability.
///
/// Every chunk must be acknowledged in full. A short count is a correctness
/// failure of the cluster, never a transient condition, so it is not retried.
#[derive(Debug, Clone)]
pub struct BulkLoader {
    chunk_size: u64,
    padding: String,
    durability: Durability,
}

impl BulkLoader {
    pub fn new(
        chunk_size: u64,
        padding_bytes: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        Ok(Self {
            chunk_size,
            padding: "x".repeat(padding_bytes),
            durability: Durability::Soft,
        })
    }

    pub fn from_config(config: &WorkloadConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.padding_bytes)
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Inserts `total` rows into `table`, issuing `ceil(total / chunk_size)` requests.
    pub async fn load(
        &self,
        conn: &dyn Connection,
        table: &TableRef,
        total: u64,
    ) -> Result<LoadSummary> {
        let start = Instant::now();
        let mut rows_so_far = 0u64;
        let mut chunks = 0u64;

        while rows_so_far < total {
            let chunk = min(self.chunk_size, total - rows_so_far);
            let rows = self.generate(rows_so_far, chunk);

            let result = conn.insert(table, rows, self.durability).await?;
            chunks += 1;

            if result.inserted != chunk {
                return Err(Error::assertion(
                    format!(
                        "chunk {chunks} of {table} at offset {rows_so_far}: requested {chunk} rows, \
                         server acknowledged {} ({} errors, first error: {})",
                        result.inserted,
                        result.errors,
                        result.first_error.as_deref().unwrap_or("none"),
                    ),
                    None,
                ));
            }

            rows_so_far += chunk;
            info!(
                "Progress: {}/{} ({:.2}s)",
                rows_so_far,
                total,
                start.elapsed().as_secs_f64()
            );
        }

        debug!(%table, rows = rows_so_far, chunks, "bulk load finished");
        Ok(LoadSummary {
            rows: rows_so_far,
            chunks,
        })
    }

    fn generate(
        &self,
        offset: u64,
        count: u64,
    ) -> Vec<Row> {
        (offset..offset + count)
            .map(|value| Row {
                value,
                padding: self.padding.clone(),
            })
            .collect()
    }
}
