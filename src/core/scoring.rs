use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::models::{
    BedroomPersonality, Component, Gender, InteractionKind, Intelligence, LifestyleHabit, Looks,
    PreferenceCategory, PreferenceTag, Preferences, Profile, ScoreBreakdown, ScoringWeights,
    SexualActivity,
};

/// Score a scorer returns when it has nothing to go on
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Per-pair inputs shared by the scorers that need more than the two profiles
#[derive(Debug, Clone, Copy)]
pub struct PairContext<'a> {
    pub distance_km: f64,
    /// False when either profile has no coordinates.
    pub locations_known: bool,
    pub max_distance_km: f64,
    pub now: DateTime<Utc>,
    pub interactions: &'a [InteractionKind],
}

/// Compute every component the weight table names.
pub fn calculate_breakdown(
    requester: &Profile,
    candidate: &Profile,
    weights: &ScoringWeights,
    ctx: &PairContext<'_>,
) -> ScoreBreakdown {
    weights
        .iter()
        .map(|(component, _)| {
            let score = score_component(component, requester, candidate, ctx);
            (component, score.clamp(0.0, 100.0))
        })
        .collect()
}

/// Dispatch to the scorer for one component
pub fn score_component(
    component: Component,
    requester: &Profile,
    candidate: &Profile,
    ctx: &PairContext<'_>,
) -> f64 {
    match component {
        Component::Physical => physical_score(requester, candidate),
        Component::Personality => personality_score(requester, candidate),
        Component::Sexual => sexual_score(requester, candidate),
        Component::Lifestyle => lifestyle_score(requester, candidate),
        Component::Location => location_score(requester, candidate, ctx),
        Component::Activity => activity_score(candidate, ctx.now),
        Component::Proximity => proximity_score(ctx),
        Component::Age => age_score(requester, candidate),
        Component::Interests => interests_score(requester, candidate),
        Component::ActivityPattern => activity_pattern_score(requester, candidate, ctx.now),
        Component::Interaction => interaction_score(ctx.interactions),
        Component::Avatar => avatar_score(requester, candidate),
    }
}

// ---------------------------------------------------------------------------
// Physical
// ---------------------------------------------------------------------------

const BODY_POINTS: f64 = 20.0;
const ETHNICITY_POINTS: f64 = 15.0;
const HAIR_COLOR_POINTS: f64 = 10.0;
const HAIR_LENGTH_POINTS: f64 = 10.0;

/// Points earned in one physical category.
///
/// A category the requester expresses no preference in, or where the
/// candidate's attribute is unknown, earns half its points.
fn category_points<T: Copy>(
    wants: &Preferences,
    category: PreferenceCategory,
    actual: Option<T>,
    tag: fn(T) -> PreferenceTag,
    points: f64,
) -> f64 {
    if !wants.has_category(category) {
        return points / 2.0;
    }
    match actual {
        Some(value) if wants.wants(tag(value)) => points,
        Some(_) => 0.0,
        None => points / 2.0,
    }
}

/// Physical attraction score (0-100)
///
/// Body type 20, ethnicity 15, hair color 10, hair length 10 points.
/// A requester with no physical preferences scores exactly 50.
pub fn physical_score(requester: &Profile, candidate: &Profile) -> f64 {
    let wants = &requester.wants;

    let awarded = category_points(
        wants,
        PreferenceCategory::Body,
        candidate.body_type,
        PreferenceTag::Body,
        BODY_POINTS,
    ) + category_points(
        wants,
        PreferenceCategory::Ethnicity,
        candidate.ethnicity,
        PreferenceTag::Ethnicity,
        ETHNICITY_POINTS,
    ) + category_points(
        wants,
        PreferenceCategory::HairColor,
        candidate.hair_color,
        PreferenceTag::HairColor,
        HAIR_COLOR_POINTS,
    ) + category_points(
        wants,
        PreferenceCategory::HairLength,
        candidate.hair_length,
        PreferenceTag::HairLength,
        HAIR_LENGTH_POINTS,
    );

    let possible = BODY_POINTS + ETHNICITY_POINTS + HAIR_COLOR_POINTS + HAIR_LENGTH_POINTS;
    awarded / possible * 100.0
}

// ---------------------------------------------------------------------------
// Personality
// ---------------------------------------------------------------------------

const COMPLEMENTARY_BEDROOM_BONUS: f64 = 15.0;
const SIMILAR_BEDROOM_BONUS: f64 = 5.0;

/// Personality compatibility score (0-100)
///
/// Closer looks and intelligence ranks score higher; opposite bedroom
/// intensities earn more than matching ones. Missing ordinals fall back to
/// the middle of their scale.
pub fn personality_score(requester: &Profile, candidate: &Profile) -> f64 {
    let my_looks = requester.looks.unwrap_or(Looks::Average).rank();
    let their_looks = candidate.looks.unwrap_or(Looks::Average).rank();
    let looks_points = f64::from(Looks::ALL.len() as i32 - (my_looks - their_looks).abs()) * 5.0;

    let my_int = requester.intelligence.unwrap_or(Intelligence::Average).rank();
    let their_int = candidate.intelligence.unwrap_or(Intelligence::Average).rank();
    let int_points =
        f64::from(Intelligence::ALL.len() as i32 - (my_int - their_int).abs()) * 5.0;

    let mine = requester
        .bedroom_personality
        .unwrap_or(BedroomPersonality::Confident);
    let theirs = candidate
        .bedroom_personality
        .unwrap_or(BedroomPersonality::Confident);
    let bedroom_points = if mine.is_low_intensity() != theirs.is_low_intensity() {
        COMPLEMENTARY_BEDROOM_BONUS
    } else {
        SIMILAR_BEDROOM_BONUS
    };

    (NEUTRAL_SCORE + looks_points + int_points + bedroom_points).min(100.0)
}

// ---------------------------------------------------------------------------
// Sexual
// ---------------------------------------------------------------------------

const SHARED_ACTIVITY_POINTS: f64 = 10.0;
const ONE_SIDED_ACTIVITY_POINTS: f64 = 3.0;
const GENDER_CATEGORY_BONUS: f64 = 10.0;

/// Overlap of two users' sexual-activity flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SexualOverlap {
    /// Activities both want.
    pub shared: usize,
    /// Activities exactly one side wants.
    pub one_sided: usize,
}

impl SexualOverlap {
    pub fn between(a: &Profile, b: &Profile) -> Self {
        SexualActivity::ALL
            .iter()
            .fold(Self::default(), |mut overlap, activity| {
                match (a.wants.wants_activity(*activity), b.wants.wants_activity(*activity)) {
                    (true, true) => overlap.shared += 1,
                    (true, false) | (false, true) => overlap.one_sided += 1,
                    (false, false) => {}
                }
                overlap
            })
    }

    /// Activities at least one side wants
    pub fn total(&self) -> usize {
        self.shared + self.one_sided
    }

    /// Shared / total, `None` when neither side set any flag.
    pub fn ratio(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.shared as f64 / total as f64)
    }

    /// Points earned (full for shared, partial for one-sided) over the
    /// maximum possible, `None` when neither side set any flag.
    pub fn points_ratio(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| {
            let points = self.shared as f64 * SHARED_ACTIVITY_POINTS
                + self.one_sided as f64 * ONE_SIDED_ACTIVITY_POINTS;
            points / (total as f64 * SHARED_ACTIVITY_POINTS)
        })
    }
}

/// Sexual compatibility score (0-100)
pub fn sexual_score(requester: &Profile, candidate: &Profile) -> f64 {
    let overlap = SexualOverlap::between(requester, candidate);
    let Some(ratio) = overlap.ratio() else {
        return NEUTRAL_SCORE;
    };

    let bonus = match candidate.gender {
        Gender::Man | Gender::TsMan | Gender::Woman | Gender::TsWoman => GENDER_CATEGORY_BONUS,
        _ => 0.0,
    };

    (ratio * 100.0 + bonus).min(100.0)
}

// ---------------------------------------------------------------------------
// Lifestyle
// ---------------------------------------------------------------------------

/// Lifestyle compatibility score (0-100)
///
/// Soft counterpart of the health dealbreakers: each habit one side practices
/// and the other rejects costs its penalty once.
pub fn lifestyle_score(requester: &Profile, candidate: &Profile) -> f64 {
    let penalties: f64 = LifestyleHabit::ALL
        .iter()
        .copied()
        .filter(|habit| {
            (requester.lifestyle.practices.contains(habit)
                && candidate.lifestyle.rejects.contains(habit))
                || (candidate.lifestyle.practices.contains(habit)
                    && requester.lifestyle.rejects.contains(habit))
        })
        .map(|habit| habit.penalty())
        .sum();

    (NEUTRAL_SCORE - penalties).max(0.0)
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

const ONLINE_NOW_BONUS: f64 = 20.0;
const ACTIVE_TODAY_BONUS: f64 = 10.0;

fn hours_since(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - timestamp).num_seconds() as f64 / 3600.0
}

/// Location / availability score (0-100)
///
/// Linear falloff to zero at the search radius, forced to 100 for a shared
/// venue, plus a bonus when the candidate was recently active.
pub fn location_score(requester: &Profile, candidate: &Profile, ctx: &PairContext<'_>) -> f64 {
    let mut score = if requester.shares_venue_with(candidate) {
        100.0
    } else if ctx.max_distance_km > 0.0 {
        (100.0 - ctx.distance_km / ctx.max_distance_km * 100.0).max(0.0)
    } else if ctx.distance_km <= 0.0 {
        100.0
    } else {
        0.0
    };

    if let Some(seen) = candidate.last_active_at {
        let hours = hours_since(seen, ctx.now);
        if hours < 1.0 {
            score += ONLINE_NOW_BONUS;
        } else if hours < 24.0 {
            score += ACTIVE_TODAY_BONUS;
        }
    }

    score.min(100.0)
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

const COMPLETENESS_POINTS: f64 = 30.0;

/// Activity / engagement score (0-100)
///
/// Completeness adds up to 30 points; recency adds 20 / 10 / 5 for activity
/// within a day / week / month. An empty profile with no timestamp stays at 50.
pub fn activity_score(candidate: &Profile, now: DateTime<Utc>) -> f64 {
    let (completed, tracked) = candidate.completeness();
    let mut score = NEUTRAL_SCORE + completed as f64 / tracked as f64 * COMPLETENESS_POINTS;

    if let Some(seen) = candidate.last_active_at {
        let days = hours_since(seen, now) / 24.0;
        score += if days < 1.0 {
            20.0
        } else if days < 7.0 {
            10.0
        } else if days < 30.0 {
            5.0
        } else {
            0.0
        };
    }

    score.min(100.0)
}

// ---------------------------------------------------------------------------
// Affinity scorers
// ---------------------------------------------------------------------------

/// Stepped proximity score (0-100)
pub fn proximity_score(ctx: &PairContext<'_>) -> f64 {
    if !ctx.locations_known {
        return NEUTRAL_SCORE;
    }

    match ctx.distance_km {
        d if d <= 1.0 => 100.0,
        d if d <= 5.0 => 90.0,
        d if d <= 10.0 => 80.0,
        d if d <= 25.0 => 60.0,
        d if d <= 50.0 => 40.0,
        d if d <= 100.0 => 20.0,
        _ => 10.0,
    }
}

/// Age closeness score (0-100). Range mutuality is the filter's job.
pub fn age_score(requester: &Profile, candidate: &Profile) -> f64 {
    match requester.age.abs_diff(candidate.age) {
        0..=2 => 100.0,
        3..=5 => 80.0,
        6..=10 => 60.0,
        11..=15 => 40.0,
        _ => 20.0,
    }
}

const SEXUAL_AFFINITY_FACTOR: f64 = 0.3;

/// Interest overlap score (0-100)
///
/// Jaccard overlap of the two interest lists with a bonus for sexual
/// compatibility. Neutral when either list is empty.
pub fn interests_score(requester: &Profile, candidate: &Profile) -> f64 {
    if requester.interests.is_empty() || candidate.interests.is_empty() {
        return NEUTRAL_SCORE;
    }

    let mine: BTreeSet<&str> = requester.interests.iter().map(String::as_str).collect();
    let theirs: BTreeSet<&str> = candidate.interests.iter().map(String::as_str).collect();
    let common = mine.intersection(&theirs).count() as f64;
    let union = mine.union(&theirs).count() as f64;
    let overlap = if union > 0.0 { common / union } else { 0.0 };

    let sexual = SexualOverlap::between(requester, candidate)
        .points_ratio()
        .unwrap_or(0.5);

    (overlap + sexual * SEXUAL_AFFINITY_FACTOR).min(1.0) * 100.0
}

fn recency_tier(hours: f64) -> f64 {
    match hours {
        h if h <= 1.0 => 1.0,
        h if h <= 6.0 => 0.9,
        h if h <= 24.0 => 0.7,
        h if h <= 72.0 => 0.5,
        h if h <= 168.0 => 0.3,
        _ => 0.1,
    }
}

/// Activity pattern score (0-100): both recently active and similarly so.
pub fn activity_pattern_score(requester: &Profile, candidate: &Profile, now: DateTime<Utc>) -> f64 {
    let (Some(mine), Some(theirs)) = (requester.last_active_at, candidate.last_active_at) else {
        return NEUTRAL_SCORE;
    };

    let a = recency_tier(hours_since(mine, now));
    let b = recency_tier(hours_since(theirs, now));
    let similarity = 1.0 - (a - b).abs();

    (a + b) / 2.0 * similarity * 100.0
}

/// Share of positive prior interactions (0-100), neutral when none.
pub fn interaction_score(interactions: &[InteractionKind]) -> f64 {
    if interactions.is_empty() {
        return NEUTRAL_SCORE;
    }

    let positive = interactions.iter().filter(|k| k.is_positive()).count();
    positive as f64 / interactions.len() as f64 * 100.0
}

const AVATAR_BODY_BONUS: f64 = 30.0;
const AVATAR_HAIR_BONUS: f64 = 20.0;

/// Avatar / look preference score (0-100)
pub fn avatar_score(requester: &Profile, candidate: &Profile) -> f64 {
    let mut score = NEUTRAL_SCORE;

    if let Some(body) = candidate.body_type {
        if requester.wants.wants(PreferenceTag::Body(body)) {
            score += AVATAR_BODY_BONUS;
        }
    }
    if let Some(hair) = candidate.hair_color {
        if requester.wants.wants(PreferenceTag::HairColor(hair)) {
            score += AVATAR_HAIR_BONUS;
        }
    }

    score.min(100.0)
}
