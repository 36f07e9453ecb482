mod bulk_loader;
pub use bulk_loader::*;
