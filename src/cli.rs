use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::{
    error::CacheError,
    queue::{jobs::Job, queue::JobQueue},
};

#[derive(Debug, Parser)]
#[command(name = "recipe-api", about = "Recipe API server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve the HTTP API and run the job worker (the default)
    Serve,
    /// Push one login count report onto the Redis job queue and exit
    EnqueueLoginReport,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("REDIS_URL must be set: the in-memory queue only lives inside the server process")]
    NoSharedQueue,
    #[error(transparent)]
    Queue(#[from] CacheError),
}

pub async fn enqueue_login_report(queue: &dyn JobQueue) -> Result<Job, CliError> {
    let job = Job::login_report();
    queue.push(&job).await?;

    Ok(job)
}
