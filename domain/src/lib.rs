//! Domain layer for consensus-engine
//!
//! This crate contains the stage protocol, the discussion records and the
//! convergence metrics. It performs no I/O and has no dependencies on
//! infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Stage protocol
//!
//! A discussion walks a fixed sequence of five stages
//! ([`StageType`]). Every stage has a required average confidence that
//! grows along the sequence; the similarity threshold is global.
//!
//! ## Convergence
//!
//! - **Similarity**: section-aware TF-IDF, blended with code and evidence
//!   similarity ([`SimilarityScorer`])
//! - **Confidence**: self-reported, parsed from `CONFIDENCE:` ([`extract_confidence`])
//! - **Decision rule**: similarity >= threshold and average confidence >=
//!   required confidence ([`ConsensusMetrics`])
//!
//! ## Cross-evaluation
//!
//! When the final stage passes, agents blindly score each other's answers
//! and the best-scored answer wins ([`EvaluationMatrix`]).

pub mod config;
pub mod consensus;
pub mod core;
pub mod discussion;
pub mod outcome;
pub mod prompt;
pub mod stage;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use consensus::{
    CodeValidator, ConsensusMetrics, EvaluationMatrix, Rubric, SimilarityMethod,
    SimilarityReport, SimilarityScorer, StaticCodeValidator, evaluation_prompt,
    extract_confidence, extract_evaluation_score, extract_final_answer, stage_passes,
};
pub use core::{error::DomainError, prompt::UserPrompt};
pub use discussion::{
    Discussion, DiscussionId, DiscussionTranscript, Response, ResponseId, Stage, StageId,
    StageTranscript,
};
pub use outcome::{DiscussionOutcome, NoConsensusReason, Resolution};
pub use prompt::PromptComposer;
pub use stage::{ProtocolConfig, StageSettings, StageType};
