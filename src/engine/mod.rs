pub mod evaluator;
pub mod filters;
pub mod lease;
pub mod transitions;
