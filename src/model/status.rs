use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::ServerName;

/// Named predicate over a table's status document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessCondition {
    /// The table accepts writes, possibly while some replicas still lag
    ReadyForWrites,
    /// Every replica of every shard has finished synchronizing
    AllReplicasReady,
}

impl ReadinessCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessCondition::ReadyForWrites => "ready_for_writes",
            ReadinessCondition::AllReplicasReady => "all_replicas_ready",
        }
    }

    pub fn is_satisfied_by(
        &self,
        status: &StatusDocument,
    ) -> bool {
        match self {
            ReadinessCondition::ReadyForWrites => status.status.ready_for_writes,
            ReadinessCondition::AllReplicasReady => status.status.all_replicas_ready,
        }
    }
}

impl fmt::Display for ReadinessCondition {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer of the server's blocking wait primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready,
    TimedOut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReadiness {
    pub ready_for_outdated_reads: bool,
    pub ready_for_reads: bool,
    pub ready_for_writes: bool,
    pub all_replicas_ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaState {
    Ready,
    Backfilling,
    Transitioning,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaStatus {
    pub server: ServerName,
    pub state: ReplicaState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatus {
    pub primary_replicas: Vec<ServerName>,
    pub replicas: Vec<ReplicaStatus>,
}

/// Snapshot of a table's state as reported by one server.
///
/// Read-only for the scenario, which only inspects `ready_for_writes` and
/// `all_replicas_ready`; the shard detail is kept for diagnostic dumps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub db: String,
    pub name: String,
    pub id: String,
    pub status: TableReadiness,
    pub shards: Vec<ShardStatus>,
}

impl StatusDocument {
    pub fn ready_for_writes(&self) -> bool {
        self.status.ready_for_writes
    }

    pub fn all_replicas_ready(&self) -> bool {
        self.status.all_replicas_ready
    }

    /// `(shard index, replica)` for every replica not in the `ready` state.
    pub fn lagging_replicas(&self) -> Vec<(usize, &ReplicaStatus)> {
        self.shards
            .iter()
            .enumerate()
            .flat_map(|(i, shard)| {
                shard
                    .replicas
                    .iter()
                    .filter(|r| r.state != ReplicaState::Ready)
                    .map(move |r| (i, r))
            })
            .collect()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{self:?} ({e})"))
    }
}
