mod evaluator;
pub use evaluator::*;
