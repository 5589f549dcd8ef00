// Model exports
pub mod domain;
pub mod preferences;
pub mod profile;
pub mod requests;
pub mod responses;

pub use domain::{
    BoundingBox, CandidateQuery, Component, InteractionHistory, InteractionKind, MatchFilters,
    MatchRecord, ScoreBreakdown, ScoredCandidate, ScoringPreset, ScoringWeights, WeightsError,
};
pub use preferences::{FlagValue, PreferenceCategory, PreferenceTag, Preferences, ProfileError, ProfileRecord};
pub use profile::{
    AgeRange, BedroomPersonality, BodyType, Ethnicity, Gender, GeoPoint, HairColor, HairLength,
    HealthCondition, HealthFlags, Intelligence, LifestyleFlags, LifestyleHabit, Looks, MeetingPlace,
    Profile, SexualActivity,
};
pub use requests::{FindMatchesRequest, SaveMatchRequest};
pub use responses::{ErrorResponse, FindMatchesResponse, HealthResponse, MatchSummary, SaveMatchResponse};
