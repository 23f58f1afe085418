//! Run Discussion use case
//!
//! Drives one discussion through the fixed stage sequence:
//!
//! ```text
//! Opening → Analysis → Refinement → LockIn → Final
//! ```
//!
//! Every stage queries all agents concurrently with prompts built from the
//! previous stage's responses and metrics. Agents that fail or miss the
//! stage deadline sit that stage out and are asked again in the next one.
//! Only the final stage decides: if it passes, the agents cross-evaluate
//! each other's answers and the best-scored answer becomes the consensus.

use crate::config::EngineParams;
use crate::ports::agent::Agent;
use crate::ports::discussion_store::DiscussionStore;
use crate::ports::progress::{NoProgress, ProgressEvent, ProgressSink};
use crate::use_cases::cross_evaluate::CrossEvaluator;
use crate::use_cases::registry::DiscussionRegistry;
use crate::use_cases::shared::{ProgressDispatcher, StorageLog, cancelled, check_cancelled};
use consensus_domain::consensus::sections::has_code;
use consensus_domain::{
    CodeValidator, ConsensusMetrics, Discussion, DiscussionOutcome, DomainError,
    NoConsensusReason, PromptComposer, ProtocolConfig, Resolution, Stage, StageType,
    StaticCodeValidator, UserPrompt, extract_confidence, extract_final_answer,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that stop a discussion before it can produce an outcome
#[derive(Error, Debug)]
pub enum RunDiscussionError {
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("At least {required} agents are required, got {got}")]
    TooFewAgents { required: usize, got: usize },

    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl RunDiscussionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunDiscussionError::Cancelled)
    }
}

/// What the stage loop produced before the discussion is closed
struct StageLoopResult {
    resolution: Resolution,
    stage_metrics: Vec<ConsensusMetrics>,
    latest_responses: BTreeMap<String, String>,
}

/// Use case for running a multi-agent discussion
pub struct RunDiscussionUseCase {
    agents: Vec<Arc<dyn Agent>>,
    store: Arc<dyn DiscussionStore>,
    protocol: Arc<ProtocolConfig>,
    params: EngineParams,
    validator: Arc<dyn CodeValidator>,
    registry: Arc<DiscussionRegistry>,
    cancellation_token: Option<CancellationToken>,
}

impl RunDiscussionUseCase {
    pub fn new(
        agents: Vec<Arc<dyn Agent>>,
        store: Arc<dyn DiscussionStore>,
        protocol: Arc<ProtocolConfig>,
    ) -> Self {
        Self {
            agents,
            store,
            protocol,
            params: EngineParams::default(),
            validator: Arc::new(StaticCodeValidator),
            registry: Arc::new(DiscussionRegistry::new()),
            cancellation_token: None,
        }
    }

    pub fn with_params(mut self, params: EngineParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_code_validator(mut self, validator: Arc<dyn CodeValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Share a registry between use cases that may touch the same discussion
    pub fn with_registry(mut self, registry: Arc<DiscussionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Execute a discussion without progress reporting
    pub async fn execute(&self, prompt: &str) -> Result<DiscussionOutcome, RunDiscussionError> {
        self.execute_with_progress(prompt, Arc::new(NoProgress)).await
    }

    /// Execute a discussion, reporting progress to `progress`
    pub async fn execute_with_progress(
        &self,
        prompt: &str,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<DiscussionOutcome, RunDiscussionError> {
        let prompt = UserPrompt::try_new(prompt)
            .map_err(|e| RunDiscussionError::InvalidPrompt(e.to_string()))?;
        self.protocol
            .validate()
            .map_err(|e| RunDiscussionError::InvalidProtocol(e.to_string()))?;
        let agents = self.participants()?;
        check_cancelled(&self.cancellation_token)?;

        let mut discussion = Discussion::new(&prompt);
        let discussion_id = discussion.id();
        let mut storage = StorageLog::default();
        storage.record(
            "discussion",
            self.store.insert_discussion(&discussion).await,
        );

        let progress = ProgressDispatcher::spawn(progress);
        progress.emit(ProgressEvent::DiscussionStarted {
            discussion_id,
            agents: agents.iter().map(|a| a.name().to_string()).collect(),
        });

        let result = self
            .run_stages(&mut discussion, &prompt, &agents, &progress, &mut storage)
            .await;
        self.registry.release(discussion_id);

        let run = match result {
            Ok(run) => run,
            Err(e) => {
                warn!("Discussion {} stopped: {}", discussion_id, e);
                self.close(&mut discussion, None, &mut storage).await;
                progress.emit(ProgressEvent::Resolved {
                    consensus: false,
                    summary: format!("Discussion stopped: {}", e),
                });
                progress.finish().await;
                return Err(e);
            }
        };

        let consensus = match &run.resolution {
            Resolution::ConsensusReached { consensus, .. } => Some(consensus.clone()),
            Resolution::NoConsensus { .. } => None,
        };
        self.close(&mut discussion, consensus, &mut storage).await;

        let summary = match &run.resolution {
            Resolution::ConsensusReached { winner, .. } => {
                format!("Consensus reached, winning answer from {}", winner)
            }
            Resolution::NoConsensus { reason } => format!("No consensus: {}", reason),
        };
        progress.emit(ProgressEvent::Resolved {
            consensus: run.resolution_is_consensus(),
            summary,
        });
        progress.finish().await;

        let storage_errors = storage.into_errors();
        Ok(DiscussionOutcome {
            discussion_id,
            resolution: run.resolution,
            individual_responses: run.latest_responses,
            metrics: run.stage_metrics.last().cloned(),
            stage_metrics: run.stage_metrics,
            durable: storage_errors.is_empty(),
            storage_errors,
        })
    }

    /// Agents taking part, after count and name checks.
    fn participants(&self) -> Result<Vec<Arc<dyn Agent>>, RunDiscussionError> {
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.name()) {
                return Err(RunDiscussionError::DuplicateAgent(agent.name().to_string()));
            }
        }
        if self.agents.len() < self.params.min_agents {
            return Err(RunDiscussionError::TooFewAgents {
                required: self.params.min_agents,
                got: self.agents.len(),
            });
        }

        let mut agents = self.agents.clone();
        if agents.len() > self.params.max_agents {
            let dropped: Vec<&str> = agents[self.params.max_agents..]
                .iter()
                .map(|a| a.name())
                .collect();
            warn!(
                "Only {} agents take part; ignoring {}",
                self.params.max_agents,
                dropped.join(", ")
            );
            agents.truncate(self.params.max_agents);
        }
        Ok(agents)
    }

    async fn run_stages(
        &self,
        discussion: &mut Discussion,
        prompt: &UserPrompt,
        agents: &[Arc<dyn Agent>],
        progress: &ProgressDispatcher,
        storage: &mut StorageLog,
    ) -> Result<StageLoopResult, RunDiscussionError> {
        let names: Vec<String> = agents.iter().map(|a| a.name().to_string()).collect();
        let composer = PromptComposer::new(&self.protocol);

        let mut prior: BTreeMap<String, String> = BTreeMap::new();
        let mut last_metrics: Option<ConsensusMetrics> = None;
        let mut latest_responses: BTreeMap<String, String> = BTreeMap::new();
        let mut stage_metrics = Vec::with_capacity(StageType::ALL.len());

        for stage_type in StageType::ALL {
            check_cancelled(&self.cancellation_token)?;
            let _serialized = self.registry.acquire(discussion.id()).await;
            let settings = self.protocol.stage(stage_type);

            let mut stage = discussion.open_stage(stage_type)?;
            storage.record(
                &format!("{} stage", stage_type),
                self.store.append_stage(&stage).await,
            );
            info!(
                "Stage {}/{}: {}",
                stage_type.ordinal() + 1,
                StageType::ALL.len(),
                stage_type.display_name()
            );
            progress.emit(ProgressEvent::StageStarted {
                stage: stage_type,
                participants: agents.len(),
            });

            let prompts = composer.compose(
                stage_type,
                prompt.content(),
                &prior,
                last_metrics.as_ref(),
                &names,
            );
            let responses = self
                .query_agents(
                    &mut stage,
                    settings.max_duration,
                    agents,
                    prompts,
                    progress,
                    storage,
                )
                .await?;
            for (agent, text) in &responses {
                latest_responses.insert(agent.clone(), text.clone());
            }

            let metrics = ConsensusMetrics::evaluate(
                settings,
                self.protocol.similarity_threshold(),
                &responses,
            );
            progress.emit(ProgressEvent::StageCompleted {
                stage: stage_type,
                similarity: metrics.similarity,
                average_confidence: metrics.average_confidence,
                required_confidence: metrics.required_confidence,
                similarity_threshold: metrics.similarity_threshold,
                passed: metrics.passed,
            });
            stage_metrics.push(metrics.clone());

            // An empty stage fails but the discussion goes on
            if responses.is_empty() {
                warn!("All agents failed during {}", stage_type);
            }

            prior = responses;
            last_metrics = Some(metrics);
        }

        // `prior` and `last_metrics` now hold the final stage
        let resolution = match last_metrics {
            _ if prior.is_empty() => Resolution::NoConsensus {
                reason: NoConsensusReason::AllAgentsFailed {
                    stage: StageType::Final,
                },
            },
            Some(metrics) if metrics.passed => self.resolve(&prior, agents, progress).await?,
            Some(metrics) => Resolution::NoConsensus {
                reason: NoConsensusReason::InsufficientAgreement {
                    similarity: metrics.similarity,
                    average_confidence: metrics.average_confidence,
                },
            },
            None => Resolution::NoConsensus {
                reason: NoConsensusReason::InsufficientAgreement {
                    similarity: 0.0,
                    average_confidence: 0.0,
                },
            },
        };

        Ok(StageLoopResult {
            resolution,
            stage_metrics,
            latest_responses,
        })
    }

    /// Query every agent concurrently for one stage.
    ///
    /// Responses are recorded and persisted as they arrive. Agents still
    /// pending at the deadline are aborted and reported as failed.
    async fn query_agents(
        &self,
        stage: &mut Stage,
        max_duration: Duration,
        agents: &[Arc<dyn Agent>],
        mut prompts: BTreeMap<String, String>,
        progress: &ProgressDispatcher,
        storage: &mut StorageLog,
    ) -> Result<BTreeMap<String, String>, RunDiscussionError> {
        let stage_type = stage.stage_type();
        let mut join_set = JoinSet::new();
        let mut pending: BTreeSet<String> = BTreeSet::new();

        for agent in agents {
            let name = agent.name().to_string();
            let Some(prompt) = prompts.remove(&name) else {
                continue;
            };
            let agent = Arc::clone(agent);
            pending.insert(name.clone());
            join_set.spawn(async move {
                let result = agent.generate_response(&prompt).await;
                (name, result)
            });
        }

        let deadline = tokio::time::sleep(max_duration);
        tokio::pin!(deadline);
        let mut responses = BTreeMap::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(&self.cancellation_token) => {
                    join_set.abort_all();
                    return Err(RunDiscussionError::Cancelled);
                }
                _ = &mut deadline => {
                    join_set.abort_all();
                    for agent in std::mem::take(&mut pending) {
                        warn!("{} gave no response within {:?} in {}", agent, max_duration, stage_type);
                        progress.emit(ProgressEvent::AgentFailed {
                            stage: stage_type,
                            agent,
                            error: format!("no response within {:?}", max_duration),
                        });
                    }
                    break;
                }
                result = join_set.join_next() => result,
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((agent, Ok(text))) => {
                    pending.remove(&agent);
                    let confidence = extract_confidence(&text);
                    debug!("{} responded in {} (confidence {:.2})", agent, stage_type, confidence);

                    let response = stage.record_response(agent.clone(), text.clone(), confidence)?;
                    storage.record(
                        &format!("response from {} in {}", agent, stage_type),
                        self.store.append_response(&response).await,
                    );
                    progress.emit(ProgressEvent::AgentResponded {
                        stage: stage_type,
                        agent: agent.clone(),
                        confidence,
                        response: text.clone(),
                    });
                    responses.insert(agent, text);
                }
                Ok((agent, Err(e))) => {
                    pending.remove(&agent);
                    warn!("{} failed in {}: {}", agent, stage_type, e);
                    progress.emit(ProgressEvent::AgentFailed {
                        stage: stage_type,
                        agent,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Agent task panicked: {}", e);
                }
            }
        }

        // Whatever is left panicked before reporting back
        for agent in pending {
            progress.emit(ProgressEvent::AgentFailed {
                stage: stage_type,
                agent,
                error: "agent task aborted".to_string(),
            });
        }

        Ok(responses)
    }

    /// Pick the winner among the final-stage answers.
    async fn resolve(
        &self,
        responses: &BTreeMap<String, String>,
        agents: &[Arc<dyn Agent>],
        progress: &ProgressDispatcher,
    ) -> Result<Resolution, RunDiscussionError> {
        let evaluations = CrossEvaluator::new(
            agents,
            self.params.evaluation_timeout,
            &self.cancellation_token,
        )
        .evaluate(responses, progress)
        .await?;

        let candidates: Vec<String> = responses.keys().cloned().collect();
        let Some((winner, answer)) = evaluations
            .winner(&candidates)
            .and_then(|name| responses.get_key_value(&name))
        else {
            return Ok(Resolution::NoConsensus {
                reason: NoConsensusReason::AllAgentsFailed {
                    stage: StageType::Final,
                },
            });
        };
        info!("Cross-evaluation winner: {}", winner);

        if responses.values().any(|text| has_code(text))
            && let Err(issues) = self.validator.validate(answer)
        {
            warn!("Answer from {} failed validation: {}", winner, issues.join("; "));
            return Ok(Resolution::NoConsensus {
                reason: NoConsensusReason::CodeValidationFailed {
                    winner: winner.clone(),
                    issues,
                },
            });
        }

        Ok(Resolution::ConsensusReached {
            consensus: extract_final_answer(answer),
            winner: winner.clone(),
            evaluations,
        })
    }

    /// Write the terminal fields of the discussion.
    async fn close(
        &self,
        discussion: &mut Discussion,
        consensus: Option<String>,
        storage: &mut StorageLog,
    ) {
        if let Err(e) = discussion.complete(consensus) {
            warn!("Discussion {} already closed: {}", discussion.id(), e);
            return;
        }
        storage.record(
            "discussion completion",
            self.store.complete_discussion(discussion).await,
        );
    }
}

impl StageLoopResult {
    fn resolution_is_consensus(&self) -> bool {
        matches!(self.resolution, Resolution::ConsensusReached { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent::AgentError;
    use crate::ports::discussion_store::StoreError;
    use async_trait::async_trait;
    use consensus_domain::{DiscussionId, DiscussionTranscript, Response};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ==================== Test Infrastructure ====================

    /// One scripted reply to a stage prompt
    #[derive(Debug, Clone)]
    enum Reply {
        Text(String),
        Fail(String),
        /// Never answers within any reasonable deadline
        Hang,
    }

    /// Agent answering stage prompts from a script, in order.
    ///
    /// Evaluation prompts are answered with a fixed score.
    struct ScriptedAgent {
        name: String,
        replies: Mutex<VecDeque<Reply>>,
        evaluation_score: f64,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        fn new(name: &str, replies: Vec<Reply>) -> Arc<Self> {
            Self::scoring(name, replies, 0.8)
        }

        fn scoring(name: &str, replies: Vec<Reply>, evaluation_score: f64) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                replies: Mutex::new(replies.into()),
                evaluation_score,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn stage_prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn generate_response(&self, prompt: &str) -> Result<String, AgentError> {
            if prompt.starts_with("Evaluate this") {
                return Ok(format!("EVALUATION_SCORE: {}", self.evaluation_score));
            }
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Reply::Fail("script exhausted".to_string()));
            match reply {
                Reply::Text(text) => Ok(text),
                Reply::Fail(msg) => Err(AgentError::RequestFailed(msg)),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    /// Store that records operation names, optionally failing every write
    #[derive(Default)]
    struct RecordingStore {
        operations: Mutex<Vec<String>>,
        fail_writes: bool,
    }

    impl RecordingStore {
        fn failing() -> Self {
            Self {
                operations: Mutex::new(Vec::new()),
                fail_writes: true,
            }
        }

        fn write(&self, op: String) -> Result<(), StoreError> {
            if self.fail_writes {
                return Err(StoreError::Io("read-only file system".to_string()));
            }
            self.operations.lock().unwrap().push(op);
            Ok(())
        }

        fn operations(&self) -> Vec<String> {
            self.operations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DiscussionStore for RecordingStore {
        async fn insert_discussion(&self, _discussion: &Discussion) -> Result<(), StoreError> {
            self.write("discussion".to_string())
        }

        async fn append_stage(&self, stage: &Stage) -> Result<(), StoreError> {
            self.write(format!("stage {}", stage.stage_type().as_str()))
        }

        async fn append_response(&self, response: &Response) -> Result<(), StoreError> {
            self.write(format!("response {}", response.agent()))
        }

        async fn complete_discussion(&self, discussion: &Discussion) -> Result<(), StoreError> {
            self.write(format!("complete {}", discussion.consensus_reached()))
        }

        async fn load_discussion(&self, id: DiscussionId) -> Result<DiscussionTranscript, StoreError> {
            Err(StoreError::NotFound(id))
        }

        async fn list_discussions(&self) -> Result<Vec<Discussion>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn text(s: &str) -> Reply {
        Reply::Text(s.to_string())
    }

    /// Five identical stage replies ending in `final_answer`
    fn convergent(final_answer: &str) -> Vec<Reply> {
        vec![
            text("UNDERSTANDING: capital question\nCONSTRAINTS: none\nINITIAL_POSITION: Paris\nCONFIDENCE: 0.8"),
            text("FORMAT_PROPOSAL: one word\nINITIAL_SOLUTION: Paris\nRATIONALE: well known\nEVIDENCE: atlas\nCONFIDENCE: 0.85"),
            text("FORMAT_AGREEMENT: yes\nREFINED_SOLUTION: Paris\nFORMAT_IMPROVEMENTS: none\nEVIDENCE: atlas\nCONFIDENCE: 0.9"),
            text("IMPLEMENTATION: Paris\nEVIDENCE: atlas\nCONFIDENCE: 0.9"),
            text(final_answer),
        ]
    }

    fn use_case(agents: Vec<Arc<ScriptedAgent>>, store: Arc<RecordingStore>) -> RunDiscussionUseCase {
        let agents: Vec<Arc<dyn Agent>> = agents
            .into_iter()
            .map(|a| a as Arc<dyn Agent>)
            .collect();
        RunDiscussionUseCase::new(agents, store, Arc::new(ProtocolConfig::default()))
    }

    // ==================== Flow Tests ====================

    #[tokio::test]
    async fn test_convergent_agents_reach_consensus() {
        let alpha = ScriptedAgent::scoring(
            "alpha",
            convergent("IMPLEMENTATION: Paris\nCONFIDENCE: 0.95"),
            0.7,
        );
        let beta = ScriptedAgent::scoring(
            "beta",
            convergent("IMPLEMENTATION: Paris\nCONFIDENCE: 0.9"),
            0.9,
        );
        let store = Arc::new(RecordingStore::default());

        let outcome = use_case(vec![alpha.clone(), beta.clone()], store.clone())
            .execute("What is the capital of France?")
            .await
            .unwrap();

        assert!(outcome.is_consensus());
        assert_eq!(outcome.consensus(), Some("Paris"));
        assert!(outcome.durable);
        assert_eq!(outcome.stage_metrics.len(), 5);
        assert_eq!(outcome.individual_responses.len(), 2);
        // beta scored alpha 0.9, alpha scored beta 0.7
        match &outcome.resolution {
            Resolution::ConsensusReached {
                winner, evaluations, ..
            } => {
                assert_eq!(winner, "alpha");
                assert_eq!(evaluations.get("beta", "alpha"), Some(0.9));
            }
            other => panic!("expected consensus, got {:?}", other),
        }

        let ops = store.operations();
        assert_eq!(ops.first().map(String::as_str), Some("discussion"));
        assert_eq!(ops.last().map(String::as_str), Some("complete true"));
        let stages: Vec<&str> = ops
            .iter()
            .filter(|op| op.starts_with("stage "))
            .map(String::as_str)
            .collect();
        assert_eq!(
            stages,
            [
                "stage opening",
                "stage analysis",
                "stage refinement",
                "stage lock_in",
                "stage final"
            ]
        );
        assert_eq!(ops.iter().filter(|op| op.starts_with("response ")).count(), 10);
    }

    #[tokio::test]
    async fn test_early_agreement_does_not_skip_stages() {
        let same = "IMPLEMENTATION: 4\nCONFIDENCE: 1.0";
        let alpha = ScriptedAgent::new("alpha", vec![text(same); 5]);
        let beta = ScriptedAgent::new("beta", vec![text(same); 5]);

        let outcome = use_case(vec![alpha.clone(), beta], Arc::new(RecordingStore::default()))
            .execute("2 + 2?")
            .await
            .unwrap();

        assert!(outcome.is_consensus());
        assert_eq!(alpha.stage_prompts().len(), 5);
        assert!(outcome.stage_metrics.iter().all(|m| m.similarity == 1.0));
    }

    #[tokio::test]
    async fn test_failed_agent_sits_out_one_stage_and_rejoins() {
        let alpha = ScriptedAgent::new("alpha", convergent("IMPLEMENTATION: Paris\nCONFIDENCE: 0.9"));
        let mut beta_script = convergent("IMPLEMENTATION: Paris\nCONFIDENCE: 0.9");
        beta_script[1] = Reply::Fail("rate limited".to_string());
        let beta = ScriptedAgent::new("beta", beta_script);
        let store = Arc::new(RecordingStore::default());

        let outcome = use_case(vec![alpha.clone(), beta.clone()], store)
            .execute("What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(outcome.stage_metrics[1].responders, 1);
        assert_eq!(outcome.stage_metrics[1].similarity, 1.0);
        assert_eq!(outcome.stage_metrics[2].responders, 2);

        // Stage 3 prompts carry only alpha's stage 2 answer
        let beta_prompts = beta.stage_prompts();
        assert_eq!(beta_prompts.len(), 5);
        assert!(beta_prompts[2].contains("--- alpha ---"));
        assert!(!beta_prompts[2].contains("--- beta ---"));
        assert!(outcome.is_consensus());
    }

    #[tokio::test]
    async fn test_all_agents_failing_ends_without_consensus() {
        let alpha = ScriptedAgent::new("alpha", vec![Reply::Fail("down".to_string())]);
        let beta = ScriptedAgent::new("beta", vec![Reply::Fail("down".to_string())]);
        let store = Arc::new(RecordingStore::default());

        let outcome = use_case(vec![alpha, beta], store.clone())
            .execute("Anything?")
            .await
            .unwrap();

        assert_eq!(outcome.status(), "no_consensus");
        assert_eq!(
            outcome.resolution,
            Resolution::NoConsensus {
                reason: NoConsensusReason::AllAgentsFailed {
                    stage: StageType::Final
                }
            }
        );
        assert!(outcome.individual_responses.is_empty());
        assert_eq!(outcome.stage_metrics.len(), 5);
        assert!(outcome.stage_metrics.iter().all(|m| m.responders == 0 && !m.passed));
        let ops = store.operations();
        assert_eq!(ops.iter().filter(|op| op.starts_with("stage ")).count(), 5);
        assert_eq!(ops.last().map(String::as_str), Some("complete false"));
    }

    #[tokio::test]
    async fn test_discussion_survives_a_stage_where_every_agent_fails() {
        let answer = "IMPLEMENTATION: Paris\nCONFIDENCE: 0.95";
        let mut script = vec![Reply::Fail("rate limited".to_string())];
        script.extend(vec![text(answer); 4]);
        let alpha = ScriptedAgent::new("alpha", script.clone());
        let beta = ScriptedAgent::new("beta", script);

        let outcome = use_case(vec![alpha, beta.clone()], Arc::new(RecordingStore::default()))
            .execute("What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(outcome.stage_metrics.len(), 5);
        assert_eq!(outcome.stage_metrics[0].responders, 0);
        assert!(!outcome.stage_metrics[0].passed);
        assert_eq!(outcome.stage_metrics[1].responders, 2);
        // nothing from the empty stage is carried into the next prompt
        assert!(!beta.stage_prompts()[1].contains("Previous responses"));
        assert_eq!(outcome.consensus(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_divergent_final_returns_both_answers() {
        let paris = "IMPLEMENTATION: The capital of France is Paris\nCONFIDENCE: 0.9";
        let lyon = "IMPLEMENTATION: Lyon remains largest gastronomic city\nCONFIDENCE: 0.9";
        let alpha = ScriptedAgent::new("alpha", convergent(paris));
        let beta = ScriptedAgent::new("beta", convergent(lyon));

        let outcome = use_case(vec![alpha, beta], Arc::new(RecordingStore::default()))
            .execute("What is the capital of France?")
            .await
            .unwrap();

        assert!(!outcome.is_consensus());
        assert!(matches!(
            outcome.resolution,
            Resolution::NoConsensus {
                reason: NoConsensusReason::InsufficientAgreement { .. }
            }
        ));
        assert_eq!(outcome.individual_responses["alpha"], paris);
        assert_eq!(outcome.individual_responses["beta"], lyon);
    }

    #[tokio::test]
    async fn test_low_final_confidence_blocks_consensus() {
        let answer = "IMPLEMENTATION: Paris\nCONFIDENCE: 0.4";
        let alpha = ScriptedAgent::new("alpha", convergent(answer));
        let beta = ScriptedAgent::new("beta", convergent(answer));

        let outcome = use_case(vec![alpha, beta], Arc::new(RecordingStore::default()))
            .execute("What is the capital of France?")
            .await
            .unwrap();

        assert!(!outcome.is_consensus());
        let metrics = outcome.metrics.unwrap();
        assert_eq!(metrics.similarity, 1.0);
        assert!(!metrics.passed);
    }

    #[tokio::test]
    async fn test_winning_code_must_pass_validation() {
        let answer = "IMPLEMENTATION:\n```python\ndef area(r):\n    # TODO: handle negatives\n    return 3.14 * r * r\n```\nCONFIDENCE: 0.9";
        let alpha = ScriptedAgent::new("alpha", convergent(answer));
        let beta = ScriptedAgent::new("beta", convergent(answer));

        let outcome = use_case(vec![alpha, beta], Arc::new(RecordingStore::default()))
            .execute("Write a circle area function")
            .await
            .unwrap();

        match outcome.resolution {
            Resolution::NoConsensus {
                reason: NoConsensusReason::CodeValidationFailed { winner, issues },
            } => {
                assert_eq!(winner, "alpha");
                assert!(issues.iter().any(|i| i.contains("TODO")));
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_valid_code_consensus_returns_implementation() {
        let answer = "IMPLEMENTATION:\n```python\ndef area(r):\n    return 3.14 * r * r\n```\nCONFIDENCE: 0.9";
        let alpha = ScriptedAgent::new("alpha", convergent(answer));
        let beta = ScriptedAgent::new("beta", convergent(answer));

        let outcome = use_case(vec![alpha, beta], Arc::new(RecordingStore::default()))
            .execute("Write a circle area function")
            .await
            .unwrap();

        let consensus = outcome.consensus().unwrap();
        assert!(consensus.starts_with("```python"));
        assert!(!consensus.contains("CONFIDENCE"));
    }

    #[tokio::test]
    async fn test_tie_goes_to_first_name() {
        let answer = "IMPLEMENTATION: Paris\nCONFIDENCE: 0.9";
        let zeta = ScriptedAgent::scoring("zeta", convergent(answer), 0.5);
        let eta = ScriptedAgent::scoring("eta", convergent(answer), 0.5);

        let outcome = use_case(vec![zeta, eta], Arc::new(RecordingStore::default()))
            .execute("Capital of France?")
            .await
            .unwrap();

        match outcome.resolution {
            Resolution::ConsensusReached { winner, .. } => assert_eq!(winner, "eta"),
            other => panic!("expected consensus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stage_deadline_drops_slow_agent() {
        let mut slow_script = convergent("IMPLEMENTATION: Paris\nCONFIDENCE: 0.9");
        slow_script[0] = Reply::Hang;
        let slow = ScriptedAgent::new("slow", slow_script);
        let fast = ScriptedAgent::new("fast", convergent("IMPLEMENTATION: Paris\nCONFIDENCE: 0.9"));

        let protocol = ProtocolConfig::default()
            .with_max_duration(StageType::Opening, Duration::from_millis(100));
        let agents: Vec<Arc<dyn Agent>> = vec![slow as Arc<dyn Agent>, fast];
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink: Arc<dyn ProgressSink> =
            Arc::new(move |msg: &str| captured.lock().unwrap().push(msg.to_string()));

        let outcome =
            RunDiscussionUseCase::new(agents, Arc::new(RecordingStore::default()), Arc::new(protocol))
                .execute_with_progress("Capital of France?", sink)
                .await
                .unwrap();

        assert_eq!(outcome.stage_metrics[0].responders, 1);
        assert_eq!(outcome.stage_metrics[1].responders, 2);
        assert!(
            seen.lock()
                .unwrap()
                .iter()
                .any(|m| m.starts_with("slow failed: no response within"))
        );
    }

    #[tokio::test]
    async fn test_cancellation_stops_discussion() {
        let alpha = ScriptedAgent::new("alpha", vec![Reply::Hang]);
        let beta = ScriptedAgent::new("beta", vec![Reply::Hang]);
        let store = Arc::new(RecordingStore::default());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result = use_case(vec![alpha, beta], store.clone())
            .with_cancellation(token)
            .execute("Anything?")
            .await;

        assert!(result.unwrap_err().is_cancelled());
        let ops = store.operations();
        assert!(!ops.iter().any(|op| op.starts_with("response ")));
        assert_eq!(ops.last().map(String::as_str), Some("complete false"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_not_fatal() {
        let answer = "IMPLEMENTATION: Paris\nCONFIDENCE: 0.9";
        let alpha = ScriptedAgent::new("alpha", convergent(answer));
        let beta = ScriptedAgent::new("beta", convergent(answer));

        let outcome = use_case(vec![alpha, beta], Arc::new(RecordingStore::failing()))
            .execute("Capital of France?")
            .await
            .unwrap();

        assert!(outcome.is_consensus());
        assert!(!outcome.durable);
        assert!(outcome.storage_errors[0].starts_with("discussion: I/O error"));
    }

    // ==================== Validation Tests ====================

    #[tokio::test]
    async fn test_rejects_too_few_agents() {
        let alpha = ScriptedAgent::new("alpha", vec![]);
        let result = use_case(vec![alpha], Arc::new(RecordingStore::default()))
            .execute("Anything?")
            .await;
        assert!(matches!(
            result,
            Err(RunDiscussionError::TooFewAgents {
                required: 2,
                got: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_rejects_duplicate_agent_names() {
        let a = ScriptedAgent::new("alpha", vec![]);
        let b = ScriptedAgent::new("alpha", vec![]);
        let result = use_case(vec![a, b], Arc::new(RecordingStore::default()))
            .execute("Anything?")
            .await;
        assert!(matches!(result, Err(RunDiscussionError::DuplicateAgent(name)) if name == "alpha"));
    }

    #[tokio::test]
    async fn test_rejects_empty_prompt() {
        let a = ScriptedAgent::new("alpha", vec![]);
        let b = ScriptedAgent::new("beta", vec![]);
        let store = Arc::new(RecordingStore::default());
        let result = use_case(vec![a, b], store.clone()).execute("   ").await;
        assert!(matches!(result, Err(RunDiscussionError::InvalidPrompt(_))));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn test_extra_agents_are_dropped() {
        let answer = "IMPLEMENTATION: 4\nCONFIDENCE: 1.0";
        let agents: Vec<Arc<ScriptedAgent>> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|name| ScriptedAgent::new(name, vec![text(answer); 5]))
            .collect();
        let last = agents[4].clone();

        let outcome = use_case(agents, Arc::new(RecordingStore::default()))
            .execute("2 + 2?")
            .await
            .unwrap();

        assert_eq!(outcome.individual_responses.len(), 4);
        assert!(last.stage_prompts().is_empty());
    }

    #[test]
    fn test_error_is_cancelled() {
        assert!(RunDiscussionError::Cancelled.is_cancelled());
        assert!(!RunDiscussionError::InvalidPrompt("x".to_string()).is_cancelled());
        assert_eq!(
            RunDiscussionError::TooFewAgents {
                required: 2,
                got: 1
            }
            .to_string(),
            "At least 2 agents are required, got 1"
        );
    }
}
