//! Ports (interfaces) for the application layer
//!
//! Ports define the boundaries between the application and the outside
//! world. Adapters in the infrastructure and presentation layers implement
//! these traits.

pub mod agent;
pub mod discussion_store;
pub mod progress;
