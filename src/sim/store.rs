use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::utils::file_io;
use crate::Result;
use crate::ServerName;
use crate::TableConfig;
use crate::TableRef;

pub(crate) const STATE_FILE: &str = "state.bin";

/// One table as seen from a single data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TableState {
    pub(crate) id: String,
    pub(crate) config: TableConfig,
    /// Rows this server holds for each shard, whether as primary or replica
    pub(crate) rows: Vec<u64>,
}

impl TableState {
    pub(crate) fn new(
        id: String,
        config: TableConfig,
    ) -> Self {
        let rows = vec![0; config.shards.len()];
        Self { id, config, rows }
    }

    pub(crate) fn primary(
        &self,
        shard: usize,
    ) -> Option<&ServerName> {
        self.config.shards.get(shard).map(|s| &s.primary_replica)
    }
}

/// Everything a simulated server persists in its data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DataDirState {
    pub(crate) databases: BTreeSet<String>,
    /// Keyed by `db.table`
    pub(crate) tables: BTreeMap<String, TableState>,
}

impl DataDirState {
    pub(crate) fn table(
        &self,
        table: &TableRef,
    ) -> Option<&TableState> {
        self.tables.get(&table.to_string())
    }

    pub(crate) fn table_mut(
        &mut self,
        table: &TableRef,
    ) -> Option<&mut TableState> {
        self.tables.get_mut(&table.to_string())
    }

    pub(crate) fn load(dir: &Path) -> Result<Self> {
        let path = state_path(dir);
        match file_io::read_if_exists(&path)? {
            Some(buf) => {
                let state: Self = bincode::deserialize(&buf)?;
                debug!(path = %path.display(), tables = state.tables.len(), "state loaded");
                Ok(state)
            }
            None => Ok(Self::default()),
        }
    }

    pub(crate) fn save(
        &self,
        dir: &Path,
    ) -> Result<()> {
        let buf = bincode::serialize(self)?;
        file_io::write_atomically(&state_path(dir), &buf)
    }
}

pub(crate) fn state_path(dir: &Path) -> PathBuf {
    dir.join(STATE_FILE)
}
