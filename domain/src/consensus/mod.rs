//! Convergence metrics
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`sections`] | labelled sections, code blocks, evidence, final answer |
//! | [`confidence`] | `CONFIDENCE:` / `EVALUATION_SCORE:` extraction |
//! | [`tfidf`] / [`sequence`] | text similarity primitives |
//! | [`code`] | code-aware similarity |
//! | [`similarity`] | blended stage score |
//! | [`metrics`] | per-stage metrics and the decision rule |
//! | [`evaluation`] | cross-evaluation prompts, matrix and winner |
//! | [`code_check`] | static quality gate for code answers |

pub mod code;
pub mod code_check;
pub mod confidence;
pub mod evaluation;
pub mod metrics;
pub mod sections;
pub mod sequence;
pub mod similarity;
pub mod tfidf;

pub use code_check::{CodeValidator, StaticCodeValidator};
pub use confidence::{extract_confidence, extract_evaluation_score};
pub use evaluation::{EvaluationMatrix, Rubric, evaluation_prompt};
pub use metrics::{ConsensusMetrics, stage_passes};
pub use sections::extract_final_answer;
pub use similarity::{SimilarityMethod, SimilarityReport, SimilarityScorer};
