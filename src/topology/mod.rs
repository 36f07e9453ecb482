mod controller;
pub use controller::*;
