use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::MatchFilters;

/// Request to rank matches for a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FindMatchesRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[validate(range(min = 0.0))]
    #[serde(default, alias = "max_distance_km", rename = "maxDistanceKm")]
    pub max_distance_km: Option<f64>,
    #[serde(default, alias = "online_only", rename = "onlineOnly")]
    pub online_only: bool,
    #[serde(default, alias = "new_users_only", rename = "newUsersOnly")]
    pub new_users_only: bool,
    /// Persist the returned matches as algorithm matches.
    #[serde(default)]
    pub save: bool,
}

impl FindMatchesRequest {
    pub fn filters(&self) -> MatchFilters {
        MatchFilters {
            max_distance_km: self.max_distance_km,
            online_only: self.online_only,
            new_users_only: self.new_users_only,
        }
    }
}

/// Request to persist a computed match
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveMatchRequest {
    #[validate(length(min = 1))]
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1))]
    #[serde(alias = "target_user_id", rename = "targetUserId")]
    pub target_user_id: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub score: f64,
}
