use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::{
    app_error::{AppError, AppResult},
    application::entity_cache::CacheStore,
    infra::InfraError,
};

/// Redis-backed snapshot store shared by every process serving the API.
#[derive(Clone)]
pub struct RedisCacheStore {
    manager: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn new(redis_url: &str) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;

        Ok(Self { manager })
    }
}

fn unavailable(err: redis::RedisError) -> AppError {
    AppError::BackendUnavailable(err.to_string())
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let raw: Option<Vec<u8>> = conn.get(key).await.map_err(unavailable)?;
        Ok(raw)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(key, value, ttl_secs)
            .await
            .map_err(unavailable)?;

        Ok(())
    }

    async fn forget(&self, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.del(key).await.map_err(unavailable)?;
        Ok(())
    }
}
