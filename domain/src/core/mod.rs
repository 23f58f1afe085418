//! Core domain concepts shared across all subdomains.
//!
//! - [`prompt::UserPrompt`]: a validated question to pose to the agents
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod prompt;
pub mod string;
