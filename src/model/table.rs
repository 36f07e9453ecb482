use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::ServerName;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub db: String,
    pub name: String,
}

impl TableRef {
    pub fn new(
        db: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            db: db.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}.{}", self.db, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    pub primary_replica: ServerName,
    pub replicas: Vec<ServerName>,
}

/// Declarative shard/replica layout of one table, as stored in the
/// cluster's table configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub db: String,
    pub name: String,
    pub shards: Vec<ShardDescriptor>,
}

impl TableConfig {
    /// `shard_count` identical shards, all led by `primary` and replicated on `replicas`.
    pub fn uniform(
        table: &TableRef,
        shard_count: usize,
        primary: &ServerName,
        replicas: &[ServerName],
    ) -> Self {
        Self {
            db: table.db.clone(),
            name: table.name.clone(),
            shards: uniform_shards(shard_count, primary, replicas),
        }
    }

    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.db.clone(), self.name.clone())
    }

    /// Every server holding at least one replica.
    pub fn servers(&self) -> BTreeSet<ServerName> {
        self.shards
            .iter()
            .flat_map(|s| s.replicas.iter().cloned())
            .collect()
    }
}

pub fn uniform_shards(
    shard_count: usize,
    primary: &ServerName,
    replicas: &[ServerName],
) -> Vec<ShardDescriptor> {
    vec![
        ShardDescriptor {
            primary_replica: primary.clone(),
            replicas: replicas.to_vec(),
        };
        shard_count
    ]
}

/// Synthetic fixture row written by the bulk loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub value: u64,
    pub padding: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Acknowledged after flush to stable storage
    Hard,
    /// Acknowledged once staged in memory
    Soft,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResult {
    pub inserted: u64,
    pub errors: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}
