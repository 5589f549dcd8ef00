use chrono::{DateTime, Duration, Utc};

use crate::models::{HealthCondition, MatchFilters, Profile};

/// Window within which a user counts as "online"
pub const ONLINE_WINDOW_MINUTES: i64 = 30;

/// Accounts younger than this count as new
pub const NEW_ACCOUNT_DAYS: i64 = 7;

/// Which dealbreaker removed a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// One side does not want the other's gender.
    Gender,
    /// One side falls outside the other's desired age range.
    Age,
    /// One side has a condition the other rejects.
    Health(HealthCondition),
}

/// Check the hard dealbreakers between two profiles.
///
/// Every rule is evaluated in both directions, so the result does not depend
/// on which profile is the requester.
#[inline]
pub fn is_compatible(requester: &Profile, candidate: &Profile) -> bool {
    rejection_reason(requester, candidate).is_none()
}

/// Return the first dealbreaker that fails, in evaluation order
/// (gender, age, health), or `None` when the pair is compatible.
pub fn rejection_reason(requester: &Profile, candidate: &Profile) -> Option<Rejection> {
    if !genders_compatible(requester, candidate) {
        return Some(Rejection::Gender);
    }

    if !ages_compatible(requester, candidate) {
        return Some(Rejection::Age);
    }

    health_conflict(requester, candidate).map(Rejection::Health)
}

#[inline]
fn genders_compatible(a: &Profile, b: &Profile) -> bool {
    a.wants.wants_gender(b.gender) && b.wants.wants_gender(a.gender)
}

#[inline]
fn ages_compatible(a: &Profile, b: &Profile) -> bool {
    a.age_range.contains(b.age) && b.age_range.contains(a.age)
}

fn health_conflict(a: &Profile, b: &Profile) -> Option<HealthCondition> {
    HealthCondition::ALL.iter().copied().find(|condition| {
        (a.health.has.contains(condition) && b.health.rejects.contains(condition))
            || (b.health.has.contains(condition) && a.health.rejects.contains(condition))
    })
}

/// Apply the caller's request filters to a candidate.
///
/// The store already narrows by bounding box; the radius check here is the
/// exact second pass.
pub fn passes_request_filters(
    candidate: &Profile,
    filters: &MatchFilters,
    distance_km: f64,
    now: DateTime<Utc>,
) -> bool {
    if let Some(max_distance) = filters.max_distance_km {
        if distance_km > max_distance {
            return false;
        }
    }

    if filters.online_only && !is_online(candidate, now) {
        return false;
    }

    if filters.new_users_only && !is_new_account(candidate, now) {
        return false;
    }

    true
}

/// Earliest `last_active_at` that still counts as online (inclusive)
pub fn online_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::minutes(ONLINE_WINDOW_MINUTES)
}

/// `created_at` must be strictly after this for a new account
pub fn new_account_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(NEW_ACCOUNT_DAYS)
}

/// Active within the online window
pub fn is_online(profile: &Profile, now: DateTime<Utc>) -> bool {
    profile
        .last_active_at
        .map(|seen| seen >= online_cutoff(now))
        .unwrap_or(false)
}

/// Account created within the new-account window
pub fn is_new_account(profile: &Profile, now: DateTime<Utc>) -> bool {
    profile
        .created_at
        .map(|created| created > new_account_cutoff(now))
        .unwrap_or(false)
}
