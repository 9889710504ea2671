use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use tokio::sync::Mutex;

use super::{jobs::Job, queue::JobQueue};
use crate::{constants::EMAIL_QUEUE_KEY, error::CacheError};

/// Redis list backed queue. Producers LPUSH, the worker BRPOPs.
///
/// BRPOP blocks the connection it runs on, so popping uses its own
/// connection and pushes never wait behind it.
pub struct RedisQueue {
    key: String,
    conn: MultiplexedConnection,
    blocking: Mutex<MultiplexedConnection>,
}

impl RedisQueue {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        let blocking = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            key: EMAIL_QUEUE_KEY.to_owned(),
            conn,
            blocking: Mutex::new(blocking),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, job: &Job) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.key, job).await?;

        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<Job>, CacheError> {
        let mut conn = self.blocking.lock().await;
        let popped: Option<(String, Job)> = redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(timeout.as_secs_f64())
            .query_async(&mut *conn)
            .await?;

        Ok(popped.map(|(_, job)| job))
    }
}
