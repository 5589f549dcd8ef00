use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::debug;

use crate::core::{
    aggregate::{aggregate, apply_boosts, round2},
    distance::distance_between,
    filters::{passes_request_filters, rejection_reason},
    scoring::{calculate_breakdown, PairContext},
};
use crate::models::{InteractionHistory, MatchFilters, Profile, ScoredCandidate, ScoringWeights};

/// Default number of results when the caller gives no limit
pub const DEFAULT_LIMIT: usize = 50;

/// Search radius used for location scoring when neither the request nor the
/// requester's profile sets one
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 50.0;

/// Pool size at which scoring switches to the rayon thread pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Per-request ranking inputs
#[derive(Debug, Clone)]
pub struct RankOptions {
    pub filters: MatchFilters,
    pub limit: usize,
    /// Reference time for recency, online and new-account checks.
    pub now: DateTime<Utc>,
    pub interactions: InteractionHistory,
    /// Fallback search radius for location scoring.
    pub default_max_distance_km: f64,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            filters: MatchFilters::default(),
            limit: DEFAULT_LIMIT,
            now: Utc::now(),
            interactions: InteractionHistory::new(),
            default_max_distance_km: DEFAULT_MAX_DISTANCE_KM,
        }
    }
}

/// Result of the matching process
#[derive(Debug)]
pub struct MatchResult {
    pub matches: Vec<ScoredCandidate>,
    /// Pool size handed to the ranker.
    pub total_candidates: usize,
}

/// Main matching orchestrator - implements the multi-stage pipeline
///
/// # Pipeline Stages
/// 1. Self exclusion and request filters (radius, online, new users)
/// 2. Mutual dealbreakers (gender, age, health)
/// 3. Component scoring, weighting and boosts
/// 4. Ranking and truncation
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    parallel_threshold: usize,
}

impl Matcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self {
            weights,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_default_weights() -> Self {
        Self::new(ScoringWeights::default())
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Rank a candidate pool for the requester
    ///
    /// Results are sorted by score descending, then distance ascending. Ties
    /// beyond that keep pool order, so the same inputs always produce the
    /// same output.
    pub fn rank(&self, requester: &Profile, pool: &[Profile], options: &RankOptions) -> MatchResult {
        let total_candidates = pool.len();
        let limit = options.limit.max(1);

        let max_distance_km = options
            .filters
            .max_distance_km
            .or(requester.max_distance_km)
            .unwrap_or(options.default_max_distance_km);

        let evaluate = |candidate: &Profile| {
            self.evaluate(requester, candidate, options, max_distance_km)
        };

        let mut scored: Vec<ScoredCandidate> = if pool.len() >= self.parallel_threshold {
            pool.par_iter().filter_map(evaluate).collect()
        } else {
            pool.iter().filter_map(evaluate).collect()
        };

        // Sort by score (descending) and then by distance (ascending)
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.distance_km
                        .partial_cmp(&b.distance_km)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        scored.truncate(limit);

        MatchResult {
            matches: scored,
            total_candidates,
        }
    }

    /// Run one candidate through the filters and, if it survives, score it.
    fn evaluate(
        &self,
        requester: &Profile,
        candidate: &Profile,
        options: &RankOptions,
        max_distance_km: f64,
    ) -> Option<ScoredCandidate> {
        if candidate.user_id == requester.user_id {
            return None;
        }

        let distance_km = distance_between(requester.location, candidate.location);

        if !passes_request_filters(candidate, &options.filters, distance_km, options.now) {
            debug!(candidate_id = %candidate.user_id, distance_km, "Candidate outside request filters");
            return None;
        }

        if let Some(reason) = rejection_reason(requester, candidate) {
            debug!(candidate_id = %candidate.user_id, ?reason, "Candidate rejected");
            return None;
        }

        let interactions = options
            .interactions
            .get(&candidate.user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let ctx = PairContext {
            distance_km,
            locations_known: requester.location.is_some() && candidate.location.is_some(),
            max_distance_km,
            now: options.now,
            interactions,
        };

        let breakdown = calculate_breakdown(requester, candidate, &self.weights, &ctx);
        let raw = aggregate(&breakdown, &self.weights);
        let score = round2(apply_boosts(raw, requester, candidate, options.now));

        Some(ScoredCandidate {
            candidate: candidate.clone(),
            score,
            distance_km,
            breakdown: breakdown.into_iter().map(|(c, s)| (c, round2(s))).collect(),
        })
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
