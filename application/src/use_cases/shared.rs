//! Shared utilities for use cases.
//!
//! Contains cancellation checking, the fire-and-forget progress dispatcher
//! and the storage error log used by discussion use cases.

use crate::ports::discussion_store::StoreError;
use crate::ports::progress::{ProgressEvent, ProgressSink};
use crate::use_cases::run_discussion::RunDiscussionError;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Check if cancellation has been requested.
///
/// Returns `Err(RunDiscussionError::Cancelled)` if the token exists and is cancelled.
pub(crate) fn check_cancelled(token: &Option<CancellationToken>) -> Result<(), RunDiscussionError> {
    if let Some(token) = token
        && token.is_cancelled()
    {
        return Err(RunDiscussionError::Cancelled);
    }
    Ok(())
}

/// Resolves when `token` is cancelled; never resolves without a token.
pub(crate) async fn cancelled(token: &Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Delivers progress events to a sink on a separate task.
///
/// `emit` never blocks and never fails. Events reach the sink in emission
/// order; a panicking sink loses only the event it panicked on.
pub(crate) struct ProgressDispatcher {
    sender: mpsc::UnboundedSender<ProgressEvent>,
    worker: JoinHandle<()>,
}

impl ProgressDispatcher {
    pub(crate) fn spawn(sink: Arc<dyn ProgressSink>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ProgressEvent>();
        let worker = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| sink.on_event(&event)));
                if delivered.is_err() {
                    warn!("Progress sink panicked on: {}", event);
                }
            }
        });
        Self { sender, worker }
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        info!("{}", event);
        // The worker only stops after the sender is dropped
        let _ = self.sender.send(event);
    }

    /// Flush pending events and stop the worker.
    pub(crate) async fn finish(self) {
        let Self { sender, worker } = self;
        drop(sender);
        if let Err(e) = worker.await {
            warn!("Progress worker ended abnormally: {}", e);
        }
    }
}

/// Storage failures collected over one discussion.
#[derive(Debug, Default)]
pub(crate) struct StorageLog {
    errors: Vec<String>,
}

impl StorageLog {
    pub(crate) fn record(&mut self, operation: &str, result: Result<(), StoreError>) {
        if let Err(e) = result {
            warn!("Failed to persist {}: {}", operation, e);
            self.errors.push(format!("{}: {}", operation, e));
        }
    }

    pub(crate) fn into_errors(self) -> Vec<String> {
        self.errors
    }
}
