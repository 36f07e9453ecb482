//! End-to-end replica recovery scenario.
//!
//! Provisions two servers, loads a sharded table on the first, adds the
//! second as a replica, restarts both from disk and checks that the table
//! is writable again while the new replica is still backfilling.

mod orchestrator;
mod report;

pub use orchestrator::*;
pub use report::*;
