//! Registry of running discussions.
//!
//! Each discussion owns a serialization token held while one of its stages
//! runs. The registry lock only guards creating and removing tokens, so two
//! discussions never wait on each other.

use consensus_domain::DiscussionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct DiscussionRegistry {
    tokens: Mutex<HashMap<DiscussionId, Arc<AsyncMutex<()>>>>,
}

impl DiscussionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&self, id: DiscussionId) -> Arc<AsyncMutex<()>> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.entry(id).or_default().clone()
    }

    /// Wait until no other stage of `id` is running and hold the token.
    pub async fn acquire(&self, id: DiscussionId) -> OwnedMutexGuard<()> {
        self.token(id).lock_owned().await
    }

    /// Forget a finished discussion.
    pub fn release(&self, id: DiscussionId) {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens.remove(&id);
    }

    pub fn active(&self) -> usize {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
