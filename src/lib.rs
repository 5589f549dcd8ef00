//! FWBer Match - compatibility scoring and match ranking service
//!
//! Scores every candidate in a requester's pool across weighted components,
//! applies mutual dealbreakers and contextual boosts, and returns a ranked,
//! truncated list with per-component breakdowns.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    distance::{calculate_bounding_box, haversine_distance},
    MatchError, MatchingEngine, Matcher, RankOptions,
};
pub use models::{
    FindMatchesRequest, FindMatchesResponse, MatchFilters, Profile, ProfileRecord, ScoredCandidate,
    ScoringPreset, ScoringWeights,
};
pub use services::{InMemoryProfileStore, ProfileStore, StoreError};
