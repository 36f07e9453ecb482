pub mod file_io;
mod scoped_timer;

pub use scoped_timer::*;
