use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use super::{
    jobs::Job,
    queue::JobQueue,
    tasks::{run_job, TaskContext},
};

const POLL_TIMEOUT: Duration = Duration::from_secs(5);
const QUEUE_ERROR_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before re-running a job whose `attempt`-th run just failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Retried(Duration),
    Dropped,
}

pub struct Worker {
    queue: Arc<dyn JobQueue>,
    tasks: TaskContext,
    policy: RetryPolicy,
}

impl Worker {
    pub fn new(queue: Arc<dyn JobQueue>, tasks: TaskContext, policy: RetryPolicy) -> Self {
        Self {
            queue,
            tasks,
            policy,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        log::info!("Job worker started");
        loop {
            match self.queue.pop(POLL_TIMEOUT).await {
                Ok(Some(job)) => {
                    self.handle(job).await;
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("Could not read from job queue: {e}");
                    tokio::time::sleep(QUEUE_ERROR_PAUSE).await;
                }
            }
        }
    }

    /// Runs one job. A failed job goes back on the queue after its backoff
    /// delay until it has been retried `max_retries` times.
    pub async fn handle(&self, job: Job) -> JobOutcome {
        let error = match run_job(&job, &self.tasks).await {
            Ok(()) => {
                log::debug!("Job {} ({}) completed", job.id, job.name());
                return JobOutcome::Completed;
            }
            Err(e) => e,
        };

        if job.attempt >= self.policy.max_retries {
            log::error!(
                "Job {} ({}) dropped after {} retries: {error}",
                job.id,
                job.name(),
                job.attempt
            );
            return JobOutcome::Dropped;
        }

        let delay = self.policy.delay_for(job.attempt);
        log::warn!(
            "Job {} ({}) failed on attempt {}, retrying in {:?}: {error}",
            job.id,
            job.name(),
            job.attempt + 1,
            delay
        );

        let queue = self.queue.clone();
        let retry = job.next_attempt();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.push(&retry).await {
                log::error!("Could not requeue job {}: {e}", retry.id);
            }
        });

        JobOutcome::Retried(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_secs(5),
        };

        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
    }
}
