//! Append-only JSONL discussion store.
//!
//! Each discussion lives in `<directory>/<id>.jsonl`. Every line is one
//! [`Record`] with a `type` tag and a `timestamp`; a discussion is rebuilt by
//! replaying its lines in order.

use super::{apply_completion, apply_response, apply_stage, start_transcript};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consensus_application::{DiscussionStore, StoreError};
use consensus_domain::{Discussion, DiscussionId, DiscussionTranscript, Response, Stage};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const EXTENSION: &str = "jsonl";

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record {
    Discussion {
        timestamp: DateTime<Utc>,
        discussion: Discussion,
    },
    Stage {
        timestamp: DateTime<Utc>,
        stage: Stage,
    },
    Response {
        timestamp: DateTime<Utc>,
        response: Response,
    },
    Completed {
        timestamp: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        final_consensus: Option<String>,
    },
}

pub struct JsonlDiscussionStore {
    directory: PathBuf,
    /// Serializes check-then-append sequences
    write_lock: Mutex<()>,
}

impl JsonlDiscussionStore {
    /// Open a store rooted at `directory`, creating it if needed.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, StoreError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(|e| {
            StoreError::Io(format!(
                "could not create store directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        Ok(Self {
            directory,
            write_lock: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: DiscussionId) -> PathBuf {
        self.directory.join(format!("{}.{}", id, EXTENSION))
    }

    async fn read_transcript(&self, id: DiscussionId) -> Result<DiscussionTranscript, StoreError> {
        let path = self.path_for(id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id)),
            Err(e) => return Err(StoreError::Io(format!("{}: {}", path.display(), e))),
        };
        replay(&path, &content)
    }

    async fn append(&self, id: DiscussionId, record: &Record) -> Result<(), StoreError> {
        let path = self.path_for(id);
        let mut line =
            serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => StoreError::NotFound(id),
                _ => StoreError::Io(format!("{}: {}", path.display(), e)),
            })?;
        write_line(&mut file, &path, &line).await
    }
}

async fn write_line(file: &mut tokio::fs::File, path: &Path, line: &str) -> Result<(), StoreError> {
    file.write_all(line.as_bytes())
        .await
        .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
    file.flush()
        .await
        .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
}

fn replay(path: &Path, content: &str) -> Result<DiscussionTranscript, StoreError> {
    let corrupt = |line_no: usize, reason: String| {
        StoreError::Corrupt(format!("{}:{}: {}", path.display(), line_no, reason))
    };

    let mut transcript: Option<DiscussionTranscript> = None;
    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record =
            serde_json::from_str(line).map_err(|e| corrupt(line_no, e.to_string()))?;

        let missing_header = || corrupt(line_no, "record before discussion header".to_string());
        match record {
            Record::Discussion { discussion, .. } => {
                if transcript.is_some() {
                    return Err(corrupt(line_no, "second discussion record".to_string()));
                }
                let started =
                    start_transcript(discussion).map_err(|e| corrupt(line_no, e.to_string()))?;
                transcript = Some(started);
            }
            Record::Stage { stage, .. } => {
                let t = transcript.as_mut().ok_or_else(missing_header)?;
                apply_stage(t, stage).map_err(|e| corrupt(line_no, e.to_string()))?;
            }
            Record::Response { response, .. } => {
                let t = transcript.as_mut().ok_or_else(missing_header)?;
                apply_response(t, response).map_err(|e| corrupt(line_no, e.to_string()))?;
            }
            Record::Completed {
                completed_at,
                final_consensus,
                ..
            } => {
                let t = transcript.as_mut().ok_or_else(missing_header)?;
                apply_completion(t, final_consensus, completed_at)
                    .map_err(|e| corrupt(line_no, e.to_string()))?;
            }
        }
    }

    transcript.ok_or_else(|| StoreError::Corrupt(format!("{}: empty file", path.display())))
}

#[async_trait]
impl DiscussionStore for JsonlDiscussionStore {
    async fn insert_discussion(&self, discussion: &Discussion) -> Result<(), StoreError> {
        start_transcript(discussion.clone())?;
        let _guard = self.write_lock.lock().await;

        let path = self.path_for(discussion.id());
        let record = Record::Discussion {
            timestamp: Utc::now(),
            discussion: discussion.clone(),
        };
        let mut line =
            serde_json::to_string(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    StoreError::Conflict(format!("discussion {} already exists", discussion.id()))
                }
                _ => StoreError::Io(format!("{}: {}", path.display(), e)),
            })?;
        write_line(&mut file, &path, &line).await?;
        debug!("Created {}", path.display());
        Ok(())
    }

    async fn append_stage(&self, stage: &Stage) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut transcript = self.read_transcript(stage.discussion_id()).await?;
        apply_stage(&mut transcript, stage.clone())?;
        self.append(
            stage.discussion_id(),
            &Record::Stage {
                timestamp: Utc::now(),
                stage: stage.clone(),
            },
        )
        .await
    }

    async fn append_response(&self, response: &Response) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut transcript = self.read_transcript(response.discussion_id()).await?;
        apply_response(&mut transcript, response.clone())?;
        self.append(
            response.discussion_id(),
            &Record::Response {
                timestamp: Utc::now(),
                response: response.clone(),
            },
        )
        .await
    }

    async fn complete_discussion(&self, discussion: &Discussion) -> Result<(), StoreError> {
        let completed_at = discussion.completed_at().ok_or_else(|| {
            StoreError::Conflict(format!("discussion {} is not completed", discussion.id()))
        })?;
        let final_consensus = discussion.final_consensus().map(str::to_string);

        let _guard = self.write_lock.lock().await;
        let mut transcript = self.read_transcript(discussion.id()).await?;
        apply_completion(&mut transcript, final_consensus.clone(), completed_at)?;
        self.append(
            discussion.id(),
            &Record::Completed {
                timestamp: Utc::now(),
                completed_at,
                final_consensus,
            },
        )
        .await
    }

    async fn load_discussion(&self, id: DiscussionId) -> Result<DiscussionTranscript, StoreError> {
        self.read_transcript(id).await
    }

    async fn list_discussions(&self) -> Result<Vec<Discussion>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", self.directory.display(), e)))?;

        let mut discussions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable {}: {}", path.display(), e);
                    continue;
                }
            };
            match replay(&path, &content) {
                Ok(transcript) => discussions.push(transcript.discussion),
                Err(e) => warn!("Skipping {}", e),
            }
        }

        discussions.sort_by_key(|d| (d.created_at(), d.id()));
        Ok(discussions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_domain::{StageType, UserPrompt};

    fn new_discussion(prompt: &str) -> Discussion {
        Discussion::new(&UserPrompt::try_new(prompt).unwrap())
    }

    #[tokio::test]
    async fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlDiscussionStore::new(dir.path()).unwrap();

        let mut discussion = new_discussion("Which queue should we use?");
        store.insert_discussion(&discussion).await.unwrap();
        for stage_type in [StageType::Opening, StageType::Analysis] {
            let mut stage = discussion.open_stage(stage_type).unwrap();
            store.append_stage(&stage).await.unwrap();
            for agent in ["alpha", "beta"] {
                let response = stage.record_response(agent, "Kafka", 0.7).unwrap();
                store.append_response(&response).await.unwrap();
            }
        }
        discussion.complete(Some("Kafka".to_string())).unwrap();
        store.complete_discussion(&discussion).await.unwrap();

        let transcript = store.load_discussion(discussion.id()).await.unwrap();
        assert_eq!(transcript.discussion, discussion);
        assert_eq!(transcript.stages.len(), 2);
        assert_eq!(transcript.stages[1].stage.stage_type(), StageType::Analysis);
        assert_eq!(transcript.stages[1].responses.len(), 2);
        assert_eq!(transcript.status(), "consensus_reached");

        let content = std::fs::read_to_string(
            dir.path().join(format!("{}.jsonl", discussion.id())),
        )
        .unwrap();
        let types: Vec<String> = content
            .lines()
            .map(|l| {
                let value: serde_json::Value = serde_json::from_str(l).unwrap();
                assert!(value.get("timestamp").is_some());
                value["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("discussion"));
        assert_eq!(types.last().map(String::as_str), Some("completed"));
        assert_eq!(types.len(), 8);
    }

    #[tokio::test]
    async fn test_insert_twice_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlDiscussionStore::new(dir.path()).unwrap();
        let discussion = new_discussion("Q");
        store.insert_discussion(&discussion).await.unwrap();
        assert!(matches!(
            store.insert_discussion(&discussion).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_append_to_unknown_discussion() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlDiscussionStore::new(dir.path()).unwrap();
        let mut discussion = new_discussion("Q");
        let stage = discussion.open_stage(StageType::Opening).unwrap();
        assert!(matches!(
            store.append_stage(&stage).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_completion_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlDiscussionStore::new(dir.path()).unwrap();
        let mut discussion = new_discussion("Q");
        store.insert_discussion(&discussion).await.unwrap();
        discussion.complete(None).unwrap();
        store.complete_discussion(&discussion).await.unwrap();
        assert!(matches!(
            store.complete_discussion(&discussion).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlDiscussionStore::new(dir.path()).unwrap();
        let first = new_discussion("first");
        store.insert_discussion(&first).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = new_discussion("second");
        store.insert_discussion(&second).await.unwrap();
        std::fs::write(dir.path().join("garbage.jsonl"), "{not json\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list_discussions().await.unwrap();
        let prompts: Vec<&str> = listed.iter().map(|d| d.prompt()).collect();
        assert_eq!(prompts, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlDiscussionStore::new(dir.path()).unwrap();
        let discussion = new_discussion("Q");
        store.insert_discussion(&discussion).await.unwrap();

        let path = dir.path().join(format!("{}.jsonl", discussion.id()));
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"type\":\"stage\"}\n");
        std::fs::write(&path, content).unwrap();

        match store.load_discussion(discussion.id()).await {
            Err(StoreError::Corrupt(msg)) => assert!(msg.contains(":2:")),
            other => panic!("expected corrupt error, got {:?}", other.map(|_| ())),
        }
    }
}
