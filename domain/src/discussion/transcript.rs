//! Read model assembled from a discussion store.

use super::entities::{Discussion, Response, Stage};
use serde::{Deserialize, Serialize};

/// A stage together with the responses recorded for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTranscript {
    pub stage: Stage,
    pub responses: Vec<Response>,
}

impl StageTranscript {
    /// Average confidence of the recorded responses (0.0 when empty)
    pub fn average_confidence(&self) -> f64 {
        if self.responses.is_empty() {
            return 0.0;
        }
        self.responses.iter().map(|r| r.confidence()).sum::<f64>() / self.responses.len() as f64
    }
}

/// Full record of one discussion, stages in ordinal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionTranscript {
    pub discussion: Discussion,
    pub stages: Vec<StageTranscript>,
}

impl DiscussionTranscript {
    pub fn status(&self) -> &'static str {
        match (
            self.discussion.is_completed(),
            self.discussion.consensus_reached(),
        ) {
            (false, _) => "in_progress",
            (true, true) => "consensus_reached",
            (true, false) => "no_consensus",
        }
    }

    /// Each agent's most recent response across all stages.
    pub fn last_responses(&self) -> Vec<&Response> {
        let mut latest: std::collections::BTreeMap<&str, &Response> = Default::default();
        for stage in &self.stages {
            for response in &stage.responses {
                latest.insert(response.agent(), response);
            }
        }
        latest.into_values().collect()
    }
}
