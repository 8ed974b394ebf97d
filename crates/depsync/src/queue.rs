//! Work-queue boundary.
//!
//! The dispatch loop never talks to a queue technology directly: depth reads
//! go through [`QueueMonitor`] and work admission goes through [`WorkSink`].
//! [`InMemoryQueue`] implements both for tests and for the CLI's
//! single-process mode.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),
}

/// Reports the current depth of a named work queue.
///
/// Treated as an opaque gauge; the admission controller fails closed when a
/// depth read errors.
#[async_trait]
pub trait QueueMonitor: Send + Sync {
    async fn depth(&self, queue: &str) -> Result<u64, QueueError>;
}

/// Accepts units of work for a named queue.
#[async_trait]
pub trait WorkSink: Send + Sync {
    async fn enqueue(&self, queue: &str, repo_id: Uuid) -> Result<(), QueueError>;
}

/// In-memory queue implementation backing tests and single-process runs.
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    inner: Arc<Mutex<HashMap<String, VecDeque<Uuid>>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all queued work for a queue, in FIFO order.
    pub fn drain(&self, queue: &str) -> Vec<Uuid> {
        let mut inner = self.inner.lock().expect("queue lock should not be poisoned");
        inner
            .get_mut(queue)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueueMonitor for InMemoryQueue {
    async fn depth(&self, queue: &str) -> Result<u64, QueueError> {
        let inner = self.inner.lock().expect("queue lock should not be poisoned");
        Ok(inner.get(queue).map(|q| q.len() as u64).unwrap_or(0))
    }
}

#[async_trait]
impl WorkSink for InMemoryQueue {
    async fn enqueue(&self, queue: &str, repo_id: Uuid) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue lock should not be poisoned");
        inner.entry(queue.to_string()).or_default().push_back(repo_id);
        Ok(())
    }
}
