//! Progress notification port
//!
//! Defines the interface for reporting progress while a discussion runs.
//! Sinks are fire-and-forget: the engine never waits on them and a sink
//! that panics does not affect the discussion.

use consensus_domain::{DiscussionId, StageType};
use std::fmt;

/// Something worth telling the user about
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    DiscussionStarted {
        discussion_id: DiscussionId,
        agents: Vec<String>,
    },
    StageStarted {
        stage: StageType,
        participants: usize,
    },
    AgentResponded {
        stage: StageType,
        agent: String,
        confidence: f64,
        response: String,
    },
    AgentFailed {
        stage: StageType,
        agent: String,
        error: String,
    },
    StageCompleted {
        stage: StageType,
        similarity: f64,
        average_confidence: f64,
        required_confidence: f64,
        similarity_threshold: f64,
        passed: bool,
    },
    EvaluationScored {
        evaluator: String,
        target: String,
        score: f64,
    },
    EvaluationFailed {
        evaluator: String,
        target: String,
        error: String,
    },
    Resolved {
        consensus: bool,
        summary: String,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::DiscussionStarted {
                discussion_id,
                agents,
            } => write!(
                f,
                "Discussion {} started with {}",
                discussion_id,
                agents.join(", ")
            ),
            ProgressEvent::StageStarted {
                stage,
                participants,
            } => write!(
                f,
                "Stage {}/{}: {} ({} agents)",
                stage.ordinal() + 1,
                StageType::ALL.len(),
                stage.display_name(),
                participants
            ),
            ProgressEvent::AgentResponded {
                agent,
                confidence,
                response,
                ..
            } => write!(
                f,
                "{} responded (confidence {:.2}):\n{}",
                agent, confidence, response
            ),
            ProgressEvent::AgentFailed { agent, error, .. } => {
                write!(f, "{} failed: {}", agent, error)
            }
            ProgressEvent::StageCompleted {
                stage,
                similarity,
                average_confidence,
                required_confidence,
                similarity_threshold,
                passed,
            } => write!(
                f,
                "{}: similarity {:.2}/{:.2}, confidence {:.2}/{:.2} -> {}",
                stage.display_name(),
                similarity,
                similarity_threshold,
                average_confidence,
                required_confidence,
                if *passed { "passed" } else { "not passed" }
            ),
            ProgressEvent::EvaluationScored {
                evaluator,
                target,
                score,
            } => write!(f, "{} scored {}: {:.2}", evaluator, target, score),
            ProgressEvent::EvaluationFailed {
                evaluator,
                target,
                error,
            } => write!(f, "{} could not score {}: {}", evaluator, target, error),
            ProgressEvent::Resolved { summary, .. } => f.write_str(summary),
        }
    }
}

/// Receiver of progress updates
///
/// Implementations live in the presentation layer. The only required
/// method takes a plain message; structured sinks override
/// [`on_event`](ProgressSink::on_event).
pub trait ProgressSink: Send + Sync {
    /// Called with a human-readable progress line
    fn on_message(&self, message: &str);

    /// Called for every event; defaults to its display text
    fn on_event(&self, event: &ProgressEvent) {
        self.on_message(&event.to_string());
    }
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_message(&self, message: &str) {
        self(message)
    }
}

/// No-op progress sink for when progress reporting is not needed
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_message(&self, _message: &str) {}
}
