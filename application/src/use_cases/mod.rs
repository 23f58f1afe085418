//! Use cases for the application layer

pub(crate) mod cross_evaluate;
pub mod registry;
pub mod run_discussion;
pub(crate) mod shared;
