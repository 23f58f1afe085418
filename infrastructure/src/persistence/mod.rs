//! Discussion store adapters
//!
//! Both stores rebuild a [`DiscussionTranscript`] by replaying records in
//! write order through the helpers below, so the domain's sequencing rules
//! (stage ordinals, one response per agent, write-once completion) hold for
//! stored data as well as for live discussions.

mod jsonl;
mod memory;

pub use jsonl::JsonlDiscussionStore;
pub use memory::InMemoryDiscussionStore;

use chrono::{DateTime, Utc};
use consensus_application::StoreError;
use consensus_domain::{Discussion, DiscussionTranscript, Response, Stage, StageTranscript};

/// Start a transcript from a freshly inserted discussion record.
pub(crate) fn start_transcript(discussion: Discussion) -> Result<DiscussionTranscript, StoreError> {
    if discussion.is_completed() || !discussion.stage_ids().is_empty() {
        return Err(StoreError::Conflict(format!(
            "discussion {} must be inserted before any stage or completion",
            discussion.id()
        )));
    }
    Ok(DiscussionTranscript {
        discussion,
        stages: Vec::new(),
    })
}

pub(crate) fn apply_stage(
    transcript: &mut DiscussionTranscript,
    stage: Stage,
) -> Result<(), StoreError> {
    if stage.discussion_id() != transcript.discussion.id() {
        return Err(StoreError::Conflict(format!(
            "stage {} belongs to discussion {}",
            stage.id(),
            stage.discussion_id()
        )));
    }
    if stage.response_count() > 0 {
        return Err(StoreError::Conflict(format!(
            "stage {} must be stored before its responses",
            stage.id()
        )));
    }
    transcript
        .discussion
        .attach_stage(&stage)
        .map_err(|e| StoreError::Conflict(e.to_string()))?;
    transcript.stages.push(StageTranscript {
        stage,
        responses: Vec::new(),
    });
    Ok(())
}

pub(crate) fn apply_response(
    transcript: &mut DiscussionTranscript,
    response: Response,
) -> Result<(), StoreError> {
    if transcript.discussion.is_completed() {
        return Err(StoreError::Conflict(format!(
            "discussion {} is already completed",
            transcript.discussion.id()
        )));
    }
    let Some(entry) = transcript
        .stages
        .iter_mut()
        .find(|s| s.stage.id() == response.stage_id())
    else {
        return Err(StoreError::Conflict(format!(
            "response {} refers to unknown stage {}",
            response.id(),
            response.stage_id()
        )));
    };
    entry
        .stage
        .attach_response(&response)
        .map_err(|e| StoreError::Conflict(e.to_string()))?;
    entry.responses.push(response);
    Ok(())
}

pub(crate) fn apply_completion(
    transcript: &mut DiscussionTranscript,
    final_consensus: Option<String>,
    completed_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    transcript
        .discussion
        .complete_at(final_consensus, completed_at)
        .map_err(|e| {
            StoreError::Conflict(format!("discussion {}: {}", transcript.discussion.id(), e))
        })
}
