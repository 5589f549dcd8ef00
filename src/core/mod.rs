// Core algorithm exports
pub mod aggregate;
pub mod distance;
pub mod engine;
pub mod filters;
pub mod matcher;
pub mod scoring;

pub use aggregate::{aggregate, apply_boosts, round2};
pub use distance::{calculate_bounding_box, distance_between, haversine_distance, is_within_bounding_box};
pub use engine::{EngineSettings, MatchError, MatchingEngine};
pub use filters::{is_compatible, passes_request_filters, rejection_reason, Rejection};
pub use matcher::{MatchResult, Matcher, RankOptions};
pub use scoring::{calculate_breakdown, score_component, PairContext, SexualOverlap};
