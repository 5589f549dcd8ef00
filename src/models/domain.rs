use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::profile::{GeoPoint, Profile};

/// Named sub-score contributing to the weighted aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Physical,
    Personality,
    Sexual,
    Lifestyle,
    /// Linear falloff against the requester's search radius.
    Location,
    /// Profile completeness plus login recency.
    Activity,
    /// Stepped distance tiers.
    Proximity,
    Age,
    Interests,
    /// Similarity of both users' login recency.
    ActivityPattern,
    Interaction,
    Avatar,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Physical => "physical",
            Component::Personality => "personality",
            Component::Sexual => "sexual",
            Component::Lifestyle => "lifestyle",
            Component::Location => "location",
            Component::Activity => "activity",
            Component::Proximity => "proximity",
            Component::Age => "age",
            Component::Interests => "interests",
            Component::ActivityPattern => "activity_pattern",
            Component::Interaction => "interaction",
            Component::Avatar => "avatar",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named weight tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPreset {
    /// Physical / personality / sexual / lifestyle / location / activity.
    #[default]
    Compatibility,
    /// Proximity / age / interests / activity pattern / interaction / avatar.
    Affinity,
}

pub const COMPATIBILITY_WEIGHTS: [(Component, f64); 6] = [
    (Component::Physical, 0.25),
    (Component::Personality, 0.20),
    (Component::Sexual, 0.20),
    (Component::Lifestyle, 0.15),
    (Component::Location, 0.10),
    (Component::Activity, 0.10),
];

pub const AFFINITY_WEIGHTS: [(Component, f64); 6] = [
    (Component::Proximity, 0.25),
    (Component::Age, 0.20),
    (Component::Interests, 0.20),
    (Component::ActivityPattern, 0.15),
    (Component::Interaction, 0.10),
    (Component::Avatar, 0.10),
];

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum WeightsError {
    #[error("weight for {component} must be a finite non-negative number, got {value}")]
    InvalidWeight { component: Component, value: f64 },

    #[error("weights must sum to 1.0, got {0}")]
    InvalidSum(f64),
}

/// Scoring weights. Only components present in the table are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringWeights {
    weights: BTreeMap<Component, f64>,
}

impl ScoringWeights {
    /// Build a validated weight table
    pub fn new<I>(weights: I) -> Result<Self, WeightsError>
    where
        I: IntoIterator<Item = (Component, f64)>,
    {
        let weights = Self {
            weights: weights.into_iter().filter(|(_, w)| *w != 0.0).collect(),
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn preset(preset: ScoringPreset) -> Self {
        let table = match preset {
            ScoringPreset::Compatibility => COMPATIBILITY_WEIGHTS,
            ScoringPreset::Affinity => AFFINITY_WEIGHTS,
        };
        Self {
            weights: table.into_iter().collect(),
        }
    }

    pub fn validate(&self) -> Result<(), WeightsError> {
        for (&component, &value) in &self.weights {
            if !value.is_finite() || value < 0.0 {
                return Err(WeightsError::InvalidWeight { component, value });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightsError::InvalidSum(sum));
        }
        Ok(())
    }

    #[inline]
    pub fn get(&self, component: Component) -> f64 {
        self.weights.get(&component).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn contains(&self, component: Component) -> bool {
        self.weights.contains_key(&component)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Component, f64)> + '_ {
        self.weights.iter().map(|(c, w)| (*c, *w))
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Name a component is reported under in a breakdown.
    ///
    /// The affinity table's distance and recency factors are reported as
    /// `location` and `activity` unless the table also carries the
    /// compatibility components of those names.
    pub fn factor_name(&self, component: Component) -> &'static str {
        match component {
            Component::Proximity if !self.contains(Component::Location) => "location",
            Component::ActivityPattern if !self.contains(Component::Activity) => "activity",
            other => other.as_str(),
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::preset(ScoringPreset::Compatibility)
    }
}

/// Per-component scores for one candidate
pub type ScoreBreakdown = BTreeMap<Component, f64>;

/// Result of scoring one candidate against the requester.
///
/// Built fresh for every request and never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Profile,
    pub score: f64,
    pub distance_km: f64,
    pub breakdown: ScoreBreakdown,
}

impl ScoredCandidate {
    pub fn candidate_id(&self) -> &str {
        &self.candidate.user_id
    }
}

/// Caller-supplied narrowing of the candidate pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFilters {
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub online_only: bool,
    #[serde(default)]
    pub new_users_only: bool,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Candidate pool query handed to the profile store
///
/// Stores keep candidates inside `bounding_box` and within `radius_km` of
/// `center`, apply the online and new-account filters, and only then cap the
/// pool at `limit`, nearest first. Without a `bounding_box` (requester has no
/// location) the pool is capped in the store's natural order.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub center: Option<GeoPoint>,
    pub radius_km: f64,
    pub bounding_box: Option<BoundingBox>,
    pub exclude_user_id: String,
    pub filters: MatchFilters,
    pub limit: usize,
    /// Reference time for the online and new-account filters.
    pub now: DateTime<Utc>,
}

/// Kind of a prior interaction between two users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    SuperLike,
    Message,
    Match,
    Pass,
    Block,
}

impl InteractionKind {
    pub fn is_positive(self) -> bool {
        matches!(
            self,
            InteractionKind::Like
                | InteractionKind::SuperLike
                | InteractionKind::Message
                | InteractionKind::Match
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::SuperLike => "super_like",
            InteractionKind::Message => "message",
            InteractionKind::Match => "match",
            InteractionKind::Pass => "pass",
            InteractionKind::Block => "block",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "view" | "viewed" => Some(InteractionKind::View),
            "like" | "liked" => Some(InteractionKind::Like),
            "super_like" | "superlike" => Some(InteractionKind::SuperLike),
            "message" => Some(InteractionKind::Message),
            "match" | "matched" => Some(InteractionKind::Match),
            "pass" | "passed" => Some(InteractionKind::Pass),
            "block" | "blocked" => Some(InteractionKind::Block),
            _ => None,
        }
    }
}

/// Prior interactions between the requester and each candidate, keyed by
/// candidate id
pub type InteractionHistory = HashMap<String, Vec<InteractionKind>>;

/// Persisted match between two users, keyed by the ordered pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: uuid::Uuid,
    pub user_low: String,
    pub user_high: String,
    pub score: f64,
    pub match_type: String,
    pub matched_at: chrono::DateTime<chrono::Utc>,
}

impl MatchRecord {
    pub fn new(user_a: &str, user_b: &str, score: f64) -> Self {
        let (user_low, user_high) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        Self {
            id: uuid::Uuid::new_v4(),
            user_low: user_low.to_string(),
            user_high: user_high.to_string(),
            score,
            match_type: "algorithm".to_string(),
            matched_at: chrono::Utc::now(),
        }
    }
}
