use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{CandidateQuery, InteractionKind, Profile};
use crate::services::cache::CacheError;

/// Errors that can occur when reading or writing profile data
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Source of profiles and interaction history for the matching engine
///
/// Implementations must hand back profiles that already passed the
/// normalization boundary; the engine never sees raw rows.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up one profile, `None` when the user does not exist
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;

    /// Candidates near the query center, narrowed by the query's bounding
    /// box when one is set. The requester is excluded.
    async fn get_candidate_pool(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError>;

    /// Prior interactions from `user_id` towards each candidate, in one batch
    async fn get_interactions(
        &self,
        user_id: &str,
        candidate_ids: &[String],
    ) -> Result<HashMap<String, Vec<InteractionKind>>, StoreError>;

    /// Persist an algorithm match. Saving the same pair again updates it.
    async fn save_match(&self, user_a: &str, user_b: &str, score: f64) -> Result<(), StoreError>;

    async fn health_check(&self) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S: ProfileStore + ?Sized> ProfileStore for Arc<S> {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        (**self).get_profile(user_id).await
    }

    async fn get_candidate_pool(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError> {
        (**self).get_candidate_pool(query).await
    }

    async fn get_interactions(
        &self,
        user_id: &str,
        candidate_ids: &[String],
    ) -> Result<HashMap<String, Vec<InteractionKind>>, StoreError> {
        (**self).get_interactions(user_id, candidate_ids).await
    }

    async fn save_match(&self, user_a: &str, user_b: &str, score: f64) -> Result<(), StoreError> {
        (**self).save_match(user_a, user_b, score).await
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        (**self).health_check().await
    }
}
