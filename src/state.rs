use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::{Config, DatabaseBackend},
    cryptography::generate_secret,
    error::{CacheError, QueryError},
    jwt::TokenService,
    memory::MemoryStore,
    postgres::PgStore,
    queue::{
        queue::{JobQueue, MemoryQueue},
        redis_queue::RedisQueue,
    },
    store::Store,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database: {0}")]
    Database(#[from] QueryError),
    #[error("job queue: {0}")]
    Queue(#[from] CacheError),
    #[error("invalid signing secret")]
    Secret,
}

/// Shared handles every request handler gets a clone of.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub queue: Arc<dyn JobQueue>,
}

impl AppContext {
    pub fn new(store: Arc<dyn Store>, tokens: TokenService, queue: Arc<dyn JobQueue>) -> Self {
        Self {
            store,
            tokens,
            queue,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        let store: Arc<dyn Store> = match &config.database {
            DatabaseBackend::Memory => {
                log::warn!("Using the in-memory store, data is lost on exit");
                Arc::new(MemoryStore::new())
            }
            DatabaseBackend::Postgres(url) => {
                Arc::new(PgStore::connect(url, config.database_max_connections).await?)
            }
        };

        let queue: Arc<dyn JobQueue> = match &config.redis_url {
            Some(url) => Arc::new(RedisQueue::connect(url).await?),
            None => {
                log::info!("REDIS_URL not set, background jobs run in-process");
                Arc::new(MemoryQueue::new())
            }
        };

        let secret = match &config.jwt_secret {
            Some(secret) => secret.to_owned(),
            None => {
                log::warn!("JWT_SECRET not set, tokens will not survive a restart");
                generate_secret(64)
            }
        };
        let tokens = TokenService::new(
            &secret,
            config.access_token_lifetime,
            config.refresh_token_lifetime,
        )
        .map_err(|_| StartupError::Secret)?;

        Ok(Self::new(store, tokens, queue))
    }
}
