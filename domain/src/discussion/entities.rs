//! Discussion, Stage and Response records.
//!
//! Ownership is one-directional: a [`Discussion`] holds the ids of its
//! stages, a [`Stage`] holds the ids of its responses, and child records
//! carry foreign keys back to their parents. Nothing here holds a reference
//! to another record.

use super::ids::{DiscussionId, ResponseId, StageId};
use crate::core::error::DomainError;
use crate::core::prompt::UserPrompt;
use crate::stage::StageType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One deliberation over a single prompt (Entity)
///
/// Append-only apart from the two terminal fields, which are written exactly
/// once by [`Discussion::complete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    id: DiscussionId,
    prompt: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    consensus_reached: bool,
    final_consensus: Option<String>,
    stage_ids: Vec<StageId>,
}

impl Discussion {
    pub fn new(prompt: &UserPrompt) -> Self {
        Self {
            id: DiscussionId::new(),
            prompt: prompt.content().to_string(),
            created_at: Utc::now(),
            completed_at: None,
            consensus_reached: false,
            final_consensus: None,
            stage_ids: Vec::new(),
        }
    }

    pub fn id(&self) -> DiscussionId {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn consensus_reached(&self) -> bool {
        self.consensus_reached
    }

    pub fn final_consensus(&self) -> Option<&str> {
        self.final_consensus.as_deref()
    }

    pub fn stage_ids(&self) -> &[StageId] {
        &self.stage_ids
    }

    /// Ordinal the next stage must take.
    pub fn next_ordinal(&self) -> usize {
        self.stage_ids.len()
    }

    /// Create the next stage record and register it with this discussion.
    ///
    /// The stage type must be the one that sits at the next ordinal of the
    /// fixed sequence.
    pub fn open_stage(&mut self, stage_type: StageType) -> Result<Stage, DomainError> {
        let stage = Stage::new(self.id, self.next_ordinal(), stage_type);
        self.attach_stage(&stage)?;
        Ok(stage)
    }

    /// Register an existing stage record (used when replaying a store).
    pub fn attach_stage(&mut self, stage: &Stage) -> Result<(), DomainError> {
        if self.is_completed() {
            return Err(DomainError::AlreadyCompleted);
        }
        let expected = self.next_ordinal();
        if stage.ordinal != expected {
            return Err(DomainError::StageOutOfSequence {
                expected,
                got: stage.ordinal,
            });
        }
        match StageType::at(expected) {
            Some(required) if required == stage.stage_type => {}
            Some(required) => {
                return Err(DomainError::StageTypeMismatch {
                    ordinal: expected,
                    expected: required.as_str().to_string(),
                    got: stage.stage_type.as_str().to_string(),
                });
            }
            None => {
                return Err(DomainError::StageOutOfSequence {
                    expected: StageType::ALL.len() - 1,
                    got: stage.ordinal,
                });
            }
        }
        self.stage_ids.push(stage.id);
        Ok(())
    }

    /// Write the terminal fields. Fails if the discussion is already closed.
    pub fn complete(&mut self, final_consensus: Option<String>) -> Result<(), DomainError> {
        self.complete_at(final_consensus, Utc::now())
    }

    pub fn complete_at(
        &mut self,
        final_consensus: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.is_completed() {
            return Err(DomainError::AlreadyCompleted);
        }
        self.consensus_reached = final_consensus.is_some();
        self.final_consensus = final_consensus;
        self.completed_at = Some(at);
        Ok(())
    }
}

/// One pass of the fixed sequence inside a discussion (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    id: StageId,
    discussion_id: DiscussionId,
    ordinal: usize,
    stage_type: StageType,
    created_at: DateTime<Utc>,
    /// agent name -> response id; at most one response per agent
    responses: BTreeMap<String, ResponseId>,
}

impl Stage {
    fn new(discussion_id: DiscussionId, ordinal: usize, stage_type: StageType) -> Self {
        Self {
            id: StageId::new(),
            discussion_id,
            ordinal,
            stage_type,
            created_at: Utc::now(),
            responses: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn discussion_id(&self) -> DiscussionId {
        self.discussion_id
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn stage_type(&self) -> StageType {
        self.stage_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn response_ids(&self) -> impl Iterator<Item = ResponseId> + '_ {
        self.responses.values().copied()
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn has_response_from(&self, agent: &str) -> bool {
        self.responses.contains_key(agent)
    }

    /// Create a response record belonging to this stage and register it.
    pub fn record_response(
        &mut self,
        agent: impl Into<String>,
        content: impl Into<String>,
        confidence: f64,
    ) -> Result<Response, DomainError> {
        let response = Response {
            id: ResponseId::new(),
            stage_id: self.id,
            discussion_id: self.discussion_id,
            agent: agent.into(),
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            created_at: Utc::now(),
        };
        self.attach_response(&response)?;
        Ok(response)
    }

    /// Register an existing response record (used when replaying a store).
    pub fn attach_response(&mut self, response: &Response) -> Result<(), DomainError> {
        if self.responses.contains_key(&response.agent) {
            return Err(DomainError::DuplicateResponse(response.agent.clone()));
        }
        self.responses.insert(response.agent.clone(), response.id);
        Ok(())
    }
}

/// One agent's answer in one stage (Entity, immutable after creation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    id: ResponseId,
    stage_id: StageId,
    discussion_id: DiscussionId,
    agent: String,
    content: String,
    confidence: f64,
    created_at: DateTime<Utc>,
}

impl Response {
    pub fn id(&self) -> ResponseId {
        self.id
    }

    pub fn stage_id(&self) -> StageId {
        self.stage_id
    }

    pub fn discussion_id(&self) -> DiscussionId {
        self.discussion_id
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discussion() -> Discussion {
        Discussion::new(&UserPrompt::try_new("Reverse a string").unwrap())
    }

    #[test]
    fn test_stages_open_in_sequence() {
        let mut d = discussion();
        for (i, stage_type) in StageType::ALL.into_iter().enumerate() {
            let stage = d.open_stage(stage_type).unwrap();
            assert_eq!(stage.ordinal(), i);
            assert_eq!(stage.discussion_id(), d.id());
        }
        assert_eq!(d.stage_ids().len(), 5);
    }

    #[test]
    fn test_stage_type_must_match_ordinal() {
        let mut d = discussion();
        let err = d.open_stage(StageType::Analysis).unwrap_err();
        assert!(matches!(err, DomainError::StageTypeMismatch { ordinal: 0, .. }));
        assert!(d.stage_ids().is_empty());
    }

    #[test]
    fn test_no_stage_beyond_final() {
        let mut d = discussion();
        for stage_type in StageType::ALL {
            d.open_stage(stage_type).unwrap();
        }
        assert!(matches!(
            d.open_stage(StageType::Final),
            Err(DomainError::StageTypeMismatch { .. }) | Err(DomainError::StageOutOfSequence { .. })
        ));
    }

    #[test]
    fn test_attach_rejects_gap() {
        let mut source = discussion();
        source.open_stage(StageType::Opening).unwrap();
        let second = source.open_stage(StageType::Analysis).unwrap();

        let mut d = source.clone();
        d.stage_ids.clear();
        assert!(matches!(
            d.attach_stage(&second),
            Err(DomainError::StageOutOfSequence {
                expected: 0,
                got: 1
            })
        ));
    }

    #[test]
    fn test_completion_is_write_once() {
        let mut d = discussion();
        d.complete(Some("olleh".to_string())).unwrap();
        assert!(d.is_completed());
        assert!(d.consensus_reached());
        assert_eq!(d.final_consensus(), Some("olleh"));

        assert!(matches!(d.complete(None), Err(DomainError::AlreadyCompleted)));
        assert_eq!(d.final_consensus(), Some("olleh"));
        assert!(matches!(
            d.open_stage(StageType::Opening),
            Err(DomainError::AlreadyCompleted)
        ));
    }

    #[test]
    fn test_completion_without_consensus() {
        let mut d = discussion();
        d.complete(None).unwrap();
        assert!(!d.consensus_reached());
        assert!(d.final_consensus().is_none());
    }

    #[test]
    fn test_one_response_per_agent() {
        let mut d = discussion();
        let mut stage = d.open_stage(StageType::Opening).unwrap();
        let response = stage.record_response("alpha", "text", 0.8).unwrap();
        assert_eq!(response.stage_id(), stage.id());
        assert_eq!(response.discussion_id(), d.id());
        assert!(stage.has_response_from("alpha"));

        assert!(matches!(
            stage.record_response("alpha", "again", 0.9),
            Err(DomainError::DuplicateResponse(name)) if name == "alpha"
        ));
        assert_eq!(stage.response_count(), 1);
    }

    #[test]
    fn test_response_confidence_clamped() {
        let mut d = discussion();
        let mut stage = d.open_stage(StageType::Opening).unwrap();
        let response = stage.record_response("alpha", "text", 3.0).unwrap();
        assert_eq!(response.confidence(), 1.0);
    }
}
