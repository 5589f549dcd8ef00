use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::{CandidateQuery, InteractionKind, Profile};
use crate::services::store::{ProfileStore, StoreError};

/// Cache tier failures. Callers in the store path log these and carry on.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Multi-tier cache manager
///
/// L1 is an in-process moka cache. L2 is Redis, shared across instances, and
/// optional: without a Redis URL only L1 is used.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Build the L1 tier, and the redis tier when a URL is given
    pub async fn new(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let redis = match redis_url {
            Some(url) => {
                let client = redis::Client::open(url)?;
                let manager = ConnectionManager::new(client).await?;
                Some(Arc::new(tokio::sync::Mutex::new(manager)))
            }
            None => None,
        };

        Ok(Self::build(redis, l1_size, ttl_secs))
    }

    /// L1-only cache
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self::build(None, l1_size, ttl_secs)
    }

    fn build(
        redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
        l1_size: u64,
        ttl_secs: u64,
    ) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            redis,
            l1_cache,
            ttl_secs,
        }
    }

    /// L1, then redis; a redis hit is copied back into L1
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let Some(redis) = &self.redis else {
            tracing::trace!("Cache miss: {}", key);
            return Ok(None);
        };

        let mut conn = redis.lock().await;
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        if let Some(json) = value {
            tracing::trace!("L2 cache hit: {}", key);

            let bytes = json.as_bytes().to_vec();
            self.l1_cache.insert(key.to_string(), bytes).await;

            return Ok(Some(serde_json::from_str(&json)?));
        }

        tracing::trace!("Cache miss: {}", key);
        Ok(None)
    }

    /// Set a value in cache (both tiers)
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;

        let bytes = json.as_bytes().to_vec();
        self.l1_cache.insert(key.to_string(), bytes).await;

        if let Some(redis) = &self.redis {
            // Set in L2 cache with explicit TTL
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    /// Invalidate in both tiers
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("DEL")
                .arg(key)
                .query_async::<()>(&mut *conn)
                .await?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            l2_enabled: self.redis.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub l2_enabled: bool,
}

/// Key namespaces shared with other services reading the same redis
pub struct CacheKey;

impl CacheKey {
    /// Build a cache key for a normalized profile
    pub fn profile(user_id: &str) -> String {
        format!("profile:{}", user_id)
    }
}

/// Profile store decorator that caches `get_profile` lookups.
///
/// Cache failures never fail a request; they are logged and the inner store
/// is consulted instead. Only requester lookups are cached; candidate pools
/// and interaction history always come from the inner store.
pub struct CachedProfileStore<S> {
    inner: S,
    cache: CacheManager,
}

impl<S: ProfileStore> CachedProfileStore<S> {
    pub fn new(inner: S, cache: CacheManager) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Drop a cached profile after it changed upstream
    pub async fn invalidate_profile(&self, user_id: &str) {
        if let Err(e) = self.cache.delete(&CacheKey::profile(user_id)).await {
            tracing::warn!("Failed to invalidate cached profile {}: {}", user_id, e);
        }
    }
}

#[async_trait]
impl<S: ProfileStore> ProfileStore for CachedProfileStore<S> {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let key = CacheKey::profile(user_id);

        match self.cache.get::<Profile>(&key).await {
            Ok(Some(profile)) => return Ok(Some(profile)),
            Ok(None) => {}
            Err(e) => tracing::warn!("Profile cache read failed for {}: {}", user_id, e),
        }

        let profile = self.inner.get_profile(user_id).await?;

        if let Some(profile) = &profile {
            if let Err(e) = self.cache.set(&key, profile).await {
                tracing::warn!("Profile cache write failed for {}: {}", user_id, e);
            }
        }

        Ok(profile)
    }

    async fn get_candidate_pool(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError> {
        self.inner.get_candidate_pool(query).await
    }

    async fn get_interactions(
        &self,
        user_id: &str,
        candidate_ids: &[String],
    ) -> Result<HashMap<String, Vec<InteractionKind>>, StoreError> {
        self.inner.get_interactions(user_id, candidate_ids).await
    }

    async fn save_match(&self, user_a: &str, user_b: &str, score: f64) -> Result<(), StoreError> {
        self.inner.save_match(user_a, user_b, score).await
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        self.inner.health_check().await
    }
}
