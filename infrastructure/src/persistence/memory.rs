//! In-process discussion store, used when persistence is switched off and
//! in tests.

use super::{apply_completion, apply_response, apply_stage, start_transcript};
use async_trait::async_trait;
use consensus_application::{DiscussionStore, StoreError};
use consensus_domain::{Discussion, DiscussionId, DiscussionTranscript, Response, Stage};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryDiscussionStore {
    transcripts: RwLock<HashMap<DiscussionId, DiscussionTranscript>>,
}

impl InMemoryDiscussionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscussionStore for InMemoryDiscussionStore {
    async fn insert_discussion(&self, discussion: &Discussion) -> Result<(), StoreError> {
        let mut transcripts = self.transcripts.write().await;
        if transcripts.contains_key(&discussion.id()) {
            return Err(StoreError::Conflict(format!(
                "discussion {} already exists",
                discussion.id()
            )));
        }
        let transcript = start_transcript(discussion.clone())?;
        transcripts.insert(discussion.id(), transcript);
        Ok(())
    }

    async fn append_stage(&self, stage: &Stage) -> Result<(), StoreError> {
        let mut transcripts = self.transcripts.write().await;
        let transcript = transcripts
            .get_mut(&stage.discussion_id())
            .ok_or(StoreError::NotFound(stage.discussion_id()))?;
        apply_stage(transcript, stage.clone())
    }

    async fn append_response(&self, response: &Response) -> Result<(), StoreError> {
        let mut transcripts = self.transcripts.write().await;
        let transcript = transcripts
            .get_mut(&response.discussion_id())
            .ok_or(StoreError::NotFound(response.discussion_id()))?;
        apply_response(transcript, response.clone())
    }

    async fn complete_discussion(&self, discussion: &Discussion) -> Result<(), StoreError> {
        let completed_at = discussion.completed_at().ok_or_else(|| {
            StoreError::Conflict(format!("discussion {} is not completed", discussion.id()))
        })?;
        let mut transcripts = self.transcripts.write().await;
        let transcript = transcripts
            .get_mut(&discussion.id())
            .ok_or(StoreError::NotFound(discussion.id()))?;
        apply_completion(
            transcript,
            discussion.final_consensus().map(str::to_string),
            completed_at,
        )
    }

    async fn load_discussion(&self, id: DiscussionId) -> Result<DiscussionTranscript, StoreError> {
        self.transcripts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_discussions(&self) -> Result<Vec<Discussion>, StoreError> {
        let mut discussions: Vec<Discussion> = self
            .transcripts
            .read()
            .await
            .values()
            .map(|t| t.discussion.clone())
            .collect();
        discussions.sort_by_key(|d| (d.created_at(), d.id()));
        Ok(discussions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_domain::{StageType, UserPrompt};

    #[tokio::test]
    async fn test_full_lifecycle() {
        let store = InMemoryDiscussionStore::new();
        let mut discussion = Discussion::new(&UserPrompt::try_new("Tabs or spaces?").unwrap());
        store.insert_discussion(&discussion).await.unwrap();

        let mut stage = discussion.open_stage(StageType::Opening).unwrap();
        store.append_stage(&stage).await.unwrap();
        let response = stage.record_response("alpha", "Spaces", 0.9).unwrap();
        store.append_response(&response).await.unwrap();

        discussion.complete(Some("Spaces".to_string())).unwrap();
        store.complete_discussion(&discussion).await.unwrap();

        let transcript = store.load_discussion(discussion.id()).await.unwrap();
        assert_eq!(transcript.status(), "consensus_reached");
        assert_eq!(transcript.stages[0].responses.len(), 1);
        assert_eq!(store.list_discussions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_double_insert_and_unknown_discussion() {
        let store = InMemoryDiscussionStore::new();
        let mut discussion = Discussion::new(&UserPrompt::try_new("Q").unwrap());
        store.insert_discussion(&discussion).await.unwrap();
        assert!(matches!(
            store.insert_discussion(&discussion).await,
            Err(StoreError::Conflict(_))
        ));

        let other = Discussion::new(&UserPrompt::try_new("Other").unwrap());
        assert!(matches!(
            store.load_discussion(other.id()).await,
            Err(StoreError::NotFound(_))
        ));

        discussion.complete(None).unwrap();
        store.complete_discussion(&discussion).await.unwrap();
        assert!(store.complete_discussion(&discussion).await.is_err());
    }

    #[tokio::test]
    async fn test_incomplete_discussion_cannot_be_completed_in_store() {
        let store = InMemoryDiscussionStore::new();
        let discussion = Discussion::new(&UserPrompt::try_new("Q").unwrap());
        store.insert_discussion(&discussion).await.unwrap();
        assert!(matches!(
            store.complete_discussion(&discussion).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
