//! Cross-evaluation of final-stage answers.
//!
//! Every responder scores every other responder's answer with a one-off
//! prompt that shows only the answer under review. Calls run concurrently,
//! each under its own timeout; failed calls are left out of the matrix.

use crate::ports::agent::{Agent, AgentError};
use crate::ports::progress::ProgressEvent;
use crate::use_cases::run_discussion::RunDiscussionError;
use crate::use_cases::shared::{ProgressDispatcher, cancelled, check_cancelled};
use consensus_domain::{EvaluationMatrix, evaluation_prompt, extract_evaluation_score};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub(crate) struct CrossEvaluator<'a> {
    agents: &'a [Arc<dyn Agent>],
    timeout: Duration,
    cancellation_token: &'a Option<CancellationToken>,
}

impl<'a> CrossEvaluator<'a> {
    pub(crate) fn new(
        agents: &'a [Arc<dyn Agent>],
        timeout: Duration,
        cancellation_token: &'a Option<CancellationToken>,
    ) -> Self {
        Self {
            agents,
            timeout,
            cancellation_token,
        }
    }

    /// Score `candidates` (agent name -> final answer) against each other.
    pub(crate) async fn evaluate(
        &self,
        candidates: &BTreeMap<String, String>,
        progress: &ProgressDispatcher,
    ) -> Result<EvaluationMatrix, RunDiscussionError> {
        check_cancelled(self.cancellation_token)?;

        let mut join_set = JoinSet::new();
        for agent in self.agents {
            let evaluator = agent.name().to_string();
            if !candidates.contains_key(&evaluator) {
                continue;
            }
            for (target, response) in candidates {
                if *target == evaluator {
                    continue;
                }
                let agent = Arc::clone(agent);
                let evaluator = evaluator.clone();
                let target = target.clone();
                let prompt = evaluation_prompt(response);
                let timeout = self.timeout;

                join_set.spawn(async move {
                    let result =
                        match tokio::time::timeout(timeout, agent.generate_response(&prompt)).await {
                            Ok(result) => result,
                            Err(_) => Err(AgentError::Timeout),
                        };
                    (evaluator, target, result)
                });
            }
        }

        let mut matrix = EvaluationMatrix::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(self.cancellation_token) => {
                    join_set.abort_all();
                    return Err(RunDiscussionError::Cancelled);
                }
                result = join_set.join_next() => result,
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((evaluator, target, Ok(text))) => {
                    let score = extract_evaluation_score(&text);
                    debug!("{} scored {}: {:.2}", evaluator, target, score);
                    matrix.record(evaluator.clone(), target.clone(), score);
                    progress.emit(ProgressEvent::EvaluationScored {
                        evaluator,
                        target,
                        score,
                    });
                }
                Ok((evaluator, target, Err(e))) => {
                    warn!("Evaluation of {} by {} failed: {}", target, evaluator, e);
                    progress.emit(ProgressEvent::EvaluationFailed {
                        evaluator,
                        target,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Evaluation task panicked: {}", e);
                }
            }
        }

        Ok(matrix)
    }
}
