//! The Policy Engine: compiles rule text, evaluates checkouts (§4.3)

pub mod compiler;
pub mod evaluator;

pub use compiler::compile;
pub use evaluator::{evaluate, EvalOutcome, UsageWindow};
