use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MatchingSettings;
use crate::core::distance::calculate_bounding_box;
use crate::core::matcher::{MatchResult, Matcher, RankOptions};
use crate::models::{
    CandidateQuery, Component, InteractionHistory, MatchFilters, ScoredCandidate, ScoringWeights,
};
use crate::services::store::{ProfileStore, StoreError};

/// Errors surfaced by the matching engine
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(#[from] StoreError),

    #[error("Ranking task failed: {0}")]
    Ranking(#[from] tokio::task::JoinError),
}

/// Request-independent engine limits
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_limit: usize,
    pub max_limit: usize,
    pub pool_limit: usize,
    pub parallel_threshold: usize,
    pub default_max_distance_km: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&MatchingSettings::default())
    }
}

impl From<&MatchingSettings> for EngineSettings {
    fn from(settings: &MatchingSettings) -> Self {
        Self {
            default_limit: settings.default_limit.max(1),
            max_limit: settings.max_limit.max(1),
            pool_limit: settings.pool_limit.max(1),
            parallel_threshold: settings.parallel_threshold,
            default_max_distance_km: settings.default_max_distance_km,
        }
    }
}

/// Loads the requester and candidate pool from a [`ProfileStore`] and ranks
/// them. Holds no per-request state.
pub struct MatchingEngine<S> {
    store: S,
    matcher: Matcher,
    settings: EngineSettings,
}

impl<S: ProfileStore> MatchingEngine<S> {
    pub fn new(store: S, weights: ScoringWeights, settings: EngineSettings) -> Self {
        let matcher = Matcher::new(weights).with_parallel_threshold(settings.parallel_threshold);
        Self {
            store,
            matcher,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn weights(&self) -> &ScoringWeights {
        self.matcher.weights()
    }

    /// Rank matches for `requester_id` as of now
    pub async fn rank(
        &self,
        requester_id: &str,
        filters: &MatchFilters,
        limit: Option<usize>,
    ) -> Result<MatchResult, MatchError> {
        self.rank_at(requester_id, filters, limit, Utc::now()).await
    }

    /// Rank matches with an explicit reference time
    pub async fn rank_at(
        &self,
        requester_id: &str,
        filters: &MatchFilters,
        limit: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<MatchResult, MatchError> {
        let limit = self.resolve_limit(limit)?;
        validate_filters(filters)?;

        let requester = self
            .store
            .get_profile(requester_id)
            .await?
            .ok_or_else(|| MatchError::ProfileNotFound(requester_id.to_string()))?;

        let radius_km = filters
            .max_distance_km
            .or(requester.max_distance_km)
            .unwrap_or(self.settings.default_max_distance_km);

        // With a known location the resolved radius bounds the pool, and the
        // ranker re-checks it exactly.
        let mut rank_filters = filters.clone();
        let bounding_box = requester.location.map(|center| {
            rank_filters.max_distance_km = Some(radius_km);
            calculate_bounding_box(center.latitude, center.longitude, radius_km)
        });

        let query = CandidateQuery {
            center: requester.location,
            radius_km,
            bounding_box,
            exclude_user_id: requester.user_id.clone(),
            filters: filters.clone(),
            limit: self.settings.pool_limit,
            now,
        };

        let pool = self.store.get_candidate_pool(&query).await?;
        debug!("Loaded {} candidates for {} within {} km", pool.len(), requester_id, radius_km);

        let interactions = if self.matcher.weights().contains(Component::Interaction) && !pool.is_empty() {
            let ids: Vec<String> = pool.iter().map(|p| p.user_id.clone()).collect();
            self.store.get_interactions(requester_id, &ids).await?
        } else {
            InteractionHistory::new()
        };

        let options = RankOptions {
            filters: rank_filters,
            limit,
            now,
            interactions,
            default_max_distance_km: self.settings.default_max_distance_km,
        };

        // Scoring runs on the blocking pool
        let matcher = self.matcher.clone();
        let result =
            tokio::task::spawn_blocking(move || matcher.rank(&requester, &pool, &options)).await?;

        info!(
            "Ranked {} matches for {} from {} candidates",
            result.matches.len(),
            requester_id,
            result.total_candidates
        );

        Ok(result)
    }

    /// Persist ranked matches. Best-effort: failures are logged and skipped.
    /// Returns the number saved.
    pub async fn save_top_matches(&self, requester_id: &str, matches: &[ScoredCandidate]) -> usize {
        let mut saved = 0;
        for scored in matches {
            match self
                .store
                .save_match(requester_id, scored.candidate_id(), scored.score)
                .await
            {
                Ok(()) => saved += 1,
                Err(e) => warn!(
                    "Failed to save match {} -> {}: {}",
                    requester_id,
                    scored.candidate_id(),
                    e
                ),
            }
        }
        saved
    }

    /// Persist a single match supplied by the caller
    pub async fn save_match(&self, user_id: &str, target_user_id: &str, score: f64) -> Result<(), MatchError> {
        if user_id == target_user_id {
            return Err(MatchError::InvalidFilter(
                "cannot match a user with themselves".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&score) {
            return Err(MatchError::InvalidFilter(format!(
                "score must be within 0-100, got {}",
                score
            )));
        }

        self.store.save_match(user_id, target_user_id, score).await?;
        Ok(())
    }

    fn resolve_limit(&self, limit: Option<usize>) -> Result<usize, MatchError> {
        match limit {
            None => Ok(self.settings.default_limit.min(self.settings.max_limit)),
            Some(0) => Err(MatchError::InvalidFilter(
                "limit must be at least 1".to_string(),
            )),
            Some(n) => Ok(n.min(self.settings.max_limit)),
        }
    }
}

fn validate_filters(filters: &MatchFilters) -> Result<(), MatchError> {
    if let Some(max_km) = filters.max_distance_km {
        if !max_km.is_finite() || max_km < 0.0 {
            return Err(MatchError::InvalidFilter(format!(
                "maxDistanceKm must be a non-negative number, got {}",
                max_km
            )));
        }
    }
    Ok(())
}
