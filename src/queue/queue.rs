use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, Notify},
    time::Instant,
};

use super::jobs::Job;
use crate::error::CacheError;

#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    async fn push(&self, job: &Job) -> Result<(), CacheError>;

    /// Waits up to `timeout` for the next job.
    async fn pop(&self, timeout: Duration) -> Result<Option<Job>, CacheError>;
}

/// Process-local FIFO queue.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    jobs: Arc<Mutex<VecDeque<Job>>>,
    notify: Arc<Notify>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs currently waiting, oldest first.
    pub async fn pending(&self) -> Vec<Job> {
        self.jobs.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn push(&self, job: &Job) -> Result<(), CacheError> {
        self.jobs.lock().await.push_back(job.clone());
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<Job>, CacheError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = self.jobs.lock().await.pop_front() {
                return Ok(Some(job));
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(self.jobs.lock().await.pop_front());
            }
        }
    }
}
