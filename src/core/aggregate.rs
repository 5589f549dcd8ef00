use chrono::{DateTime, Utc};

use super::filters::is_new_account;
use crate::models::{Profile, ScoreBreakdown, ScoringWeights};

/// Multiplier when both users are checked in at the same venue
pub const SAME_VENUE_BOOST: f64 = 1.2;

/// Multiplier for candidates with a recently created account
pub const NEW_USER_BOOST: f64 = 1.1;

/// Weighted sum of the component scores. Components missing from the
/// breakdown contribute nothing.
pub fn aggregate(breakdown: &ScoreBreakdown, weights: &ScoringWeights) -> f64 {
    weights
        .iter()
        .map(|(component, weight)| breakdown.get(&component).copied().unwrap_or(0.0) * weight)
        .sum()
}

/// Apply the contextual multipliers and clamp to `[0, 100]`.
///
/// Boosts stack multiplicatively.
pub fn apply_boosts(score: f64, requester: &Profile, candidate: &Profile, now: DateTime<Utc>) -> f64 {
    let mut boosted = score;

    if requester.shares_venue_with(candidate) {
        boosted *= SAME_VENUE_BOOST;
    }

    if is_new_account(candidate, now) {
        boosted *= NEW_USER_BOOST;
    }

    clamp_score(boosted)
}

/// Clamp to `[0, 100]`, mapping NaN to zero
#[inline]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Round to two decimal places
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
