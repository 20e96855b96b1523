//! Read-through cache for role and user snapshots.
//!
//! Keys are namespaced per entity kind: one coarse `"<kind>-list"` key for the
//! full listing and one `"<kind>-<uuid>"` key per entity. The store stays the
//! source of truth. A cache failure or timeout degrades to a direct store read
//! and is never surfaced to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::app_error::AppResult;
use crate::domain::entities::entity_kind::EntityKind;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

/// Key-value backend holding serialized snapshots.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()>;
    /// Removing an absent key is not an error.
    async fn forget(&self, key: &str) -> AppResult<()>;
}

/// Per-kind switch and key layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCacheConfig {
    pub enabled: bool,
    pub list_key: String,
    pub entity_prefix: String,
}

impl EntityCacheConfig {
    pub fn for_kind(kind: EntityKind) -> Self {
        Self {
            enabled: true,
            list_key: format!("{kind}-list"),
            entity_prefix: format!("{kind}-"),
        }
    }

    pub fn entity_key(&self, uuid: Uuid) -> String {
        format!("{}{}", self.entity_prefix, uuid)
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub role: EntityCacheConfig,
    pub user: EntityCacheConfig,
    pub ttl: Duration,
    /// Cache calls slower than this count as failed.
    pub op_timeout: Duration,
    /// When set, every invalidation is repeated once after this delay.
    pub reinvalidate_after: Option<Duration>,
}

impl CacheSettings {
    pub fn entity(&self, kind: EntityKind) -> &EntityCacheConfig {
        match kind {
            EntityKind::Role => &self.role,
            EntityKind::User => &self.user,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            role: EntityCacheConfig::for_kind(EntityKind::Role),
            user: EntityCacheConfig::for_kind(EntityKind::User),
            ttl: DEFAULT_CACHE_TTL,
            op_timeout: DEFAULT_OP_TIMEOUT,
            reinvalidate_after: None,
        }
    }
}

#[derive(Clone)]
pub struct EntityCache {
    store: Arc<dyn CacheStore>,
    settings: Arc<CacheSettings>,
}

impl EntityCache {
    pub fn new(store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
        }
    }

    /// Serve the full listing of `kind`, loading and caching it on a miss.
    pub async fn get_list<T, F, Fut>(&self, kind: EntityKind, load: F) -> AppResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Vec<T>>>,
    {
        let config = self.settings.entity(kind);
        if !config.enabled {
            return load().await;
        }

        let key = config.list_key.as_str();
        if let Some(items) = self.fetch::<Vec<T>>(key).await {
            debug!(%kind, key = %key, "Cache hit");
            return Ok(items);
        }

        debug!(%kind, key = %key, "Cache miss");
        let items = load().await?;
        self.store_value(key, &items).await;
        Ok(items)
    }

    /// Serve one entity, loading and caching it on a miss. Absent entities
    /// are not cached.
    pub async fn get_by_uuid<T, F, Fut>(
        &self,
        kind: EntityKind,
        uuid: Uuid,
        load: F,
    ) -> AppResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<Option<T>>>,
    {
        let config = self.settings.entity(kind);
        if !config.enabled {
            return load().await;
        }

        let key = config.entity_key(uuid);
        if let Some(item) = self.fetch::<T>(&key).await {
            debug!(%kind, key = %key, "Cache hit");
            return Ok(Some(item));
        }

        debug!(%kind, key = %key, "Cache miss");
        let loaded = load().await?;
        if let Some(item) = &loaded {
            self.store_value(&key, item).await;
        }
        Ok(loaded)
    }

    /// Drop the list key of `kind`, plus the entity key when `uuid` is given.
    pub async fn invalidate(&self, kind: EntityKind, uuid: Option<Uuid>) {
        self.invalidate_many(kind, uuid.as_slice()).await;
    }

    /// Drop the list key of `kind` and the entity key of every uuid.
    pub async fn invalidate_many(&self, kind: EntityKind, uuids: &[Uuid]) {
        let config = self.settings.entity(kind);
        if !config.enabled {
            return;
        }

        let mut keys = Vec::with_capacity(uuids.len() + 1);
        keys.push(config.list_key.clone());
        keys.extend(uuids.iter().map(|uuid| config.entity_key(*uuid)));

        debug!(%kind, keys = ?keys, "Invalidating cache entries");
        self.forget_keys(keys).await;
    }

    async fn fetch<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match timeout(self.settings.op_timeout, self.store.get(key)).await {
            Ok(Ok(Some(bytes))) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(key = %key, error = %err, "Discarding undecodable cache entry");
                    forget_key(self.store.as_ref(), key, self.settings.op_timeout).await;
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(err)) => {
                warn!(key = %key, error = %err, "Cache read failed, reading from store");
                None
            }
            Err(_) => {
                warn!(key = %key, "Cache read timed out, reading from store");
                None
            }
        }
    }

    async fn store_value<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(key = %key, error = %err, "Failed to serialize cache entry");
                return;
            }
        };

        let put = self.store.put(key, bytes, self.settings.ttl);
        match timeout(self.settings.op_timeout, put).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(key = %key, error = %err, "Cache write failed"),
            Err(_) => warn!(key = %key, "Cache write timed out"),
        }
    }

    async fn forget_keys(&self, keys: Vec<String>) {
        let op_timeout = self.settings.op_timeout;
        for key in &keys {
            forget_key(self.store.as_ref(), key, op_timeout).await;
        }

        // A reader that loaded from the store before our write committed may
        // have put a stale snapshot back after the first pass.
        if let Some(delay) = self.settings.reinvalidate_after {
            let store = self.store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for key in &keys {
                    forget_key(store.as_ref(), key, op_timeout).await;
                }
            });
        }
    }
}

async fn forget_key(store: &dyn CacheStore, key: &str, op_timeout: Duration) {
    match timeout(op_timeout, store.forget(key)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(key = %key, error = %err, "Cache invalidation failed"),
        Err(_) => warn!(key = %key, "Cache invalidation timed out"),
    }
}
