//! Regression scenario for replica recovery after a cluster restart.
//!
//! A two-server cluster gets a sharded table, a bulk load on the first
//! server, and the second server as an extra replica. Both servers are then
//! restarted from their data directories. The scenario checks that the
//! table accepts writes again within a bound while the new replica is
//! still backfilling.
//!
//! The cluster is reached through the [`Supervisor`], [`Connector`] and
//! [`Connection`] traits; [`SimulatedCluster`] implements them in process.

mod cluster;
mod config;
mod errors;
mod model;
mod readiness;
mod scenario;
mod sim;
mod topology;
pub mod utils;
mod workload;

pub use cluster::*;
pub use config::*;
pub use errors::*;
pub use model::*;
pub use readiness::*;
pub use scenario::*;
pub use sim::*;
pub use topology::*;
pub use workload::*;
