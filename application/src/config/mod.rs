//! Application-level configuration.
//!
//! - [`EngineParams`]: agent count limits and cross-evaluation timeout

pub mod engine_params;

pub use engine_params::EngineParams;
