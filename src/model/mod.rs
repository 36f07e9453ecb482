//! Value types exchanged between the scenario and the cluster under test.

mod server;
mod status;
mod table;

pub use server::*;
pub use status::*;
pub use table::*;

#[cfg(test)]
mod model_test;
