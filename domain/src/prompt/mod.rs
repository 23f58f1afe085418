//! Prompt domain
//!
//! Stage templates and the composer that turns them into per-agent prompts.

pub mod composer;
pub mod template;

pub use composer::PromptComposer;
