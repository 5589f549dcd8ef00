use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::domain::{ScoredCandidate, ScoringWeights};

/// One ranked candidate as returned to the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub candidate_id: String,
    pub score: f64,
    pub distance_km: f64,
    pub breakdown: BTreeMap<String, f64>,
}

impl MatchSummary {
    /// Breakdown keys follow [`ScoringWeights::factor_name`]
    pub fn new(scored: &ScoredCandidate, weights: &ScoringWeights) -> Self {
        Self {
            candidate_id: scored.candidate.user_id.clone(),
            score: scored.score,
            distance_km: (scored.distance_km * 100.0).round() / 100.0,
            breakdown: scored
                .breakdown
                .iter()
                .map(|(component, score)| (weights.factor_name(*component).to_string(), *score))
                .collect(),
        }
    }
}

/// Response for find matches endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMatchesResponse {
    pub matches: Vec<MatchSummary>,
    pub total_results: usize,
    /// Pool size before filtering.
    pub total_candidates: usize,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Save match response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveMatchResponse {
    pub success: bool,
}
