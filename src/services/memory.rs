use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::core::distance::{distance_between, is_within_bounding_box};
use crate::core::filters::{is_new_account, is_online};
use crate::models::{CandidateQuery, InteractionKind, MatchRecord, Profile};
use crate::services::store::{ProfileStore, StoreError};

/// Process-local profile store
///
/// Profiles are kept ordered by user id so candidate pools come back in a
/// stable order.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<BTreeMap<String, Profile>>,
    interactions: RwLock<HashMap<(String, String), Vec<InteractionKind>>>,
    matches: RwLock<BTreeMap<(String, String), MatchRecord>>,
    offline: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let map = profiles
            .into_iter()
            .map(|p| (p.user_id.clone(), p))
            .collect();
        Self {
            profiles: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Insert or replace a profile
    pub async fn upsert_profile(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    pub async fn record_interaction(&self, user_id: &str, target_user_id: &str, kind: InteractionKind) {
        self.interactions
            .write()
            .await
            .entry((user_id.to_string(), target_user_id.to_string()))
            .or_default()
            .push(kind);
    }

    /// Every saved match, ordered by user pair
    pub async fn saved_matches(&self) -> Vec<MatchRecord> {
        self.matches.read().await.values().cloned().collect()
    }

    /// Simulate an outage: every call fails with [`StoreError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        self.ensure_online()?;
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn get_candidate_pool(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError> {
        self.ensure_online()?;
        let profiles = self.profiles.read().await;
        let filters = &query.filters;

        let mut pool: Vec<(f64, &Profile)> = profiles
            .values()
            .filter(|p| p.user_id != query.exclude_user_id)
            .filter(|p| !filters.online_only || is_online(p, query.now))
            .filter(|p| !filters.new_users_only || is_new_account(p, query.now))
            .filter_map(|p| match (&query.bounding_box, query.center, p.location) {
                (Some(bbox), Some(center), Some(point)) => {
                    if !is_within_bounding_box(point.latitude, point.longitude, bbox) {
                        return None;
                    }
                    let distance = distance_between(Some(center), Some(point));
                    (distance <= query.radius_km).then_some((distance, p))
                }
                (Some(_), _, _) => None,
                (None, _, _) => Some((0.0, p)),
            })
            .collect();

        // Nearest first; equal distances keep user id order
        pool.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(pool
            .into_iter()
            .take(query.limit)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn get_interactions(
        &self,
        user_id: &str,
        candidate_ids: &[String],
    ) -> Result<HashMap<String, Vec<InteractionKind>>, StoreError> {
        self.ensure_online()?;
        let interactions = self.interactions.read().await;

        Ok(candidate_ids
            .iter()
            .filter_map(|id| {
                interactions
                    .get(&(user_id.to_string(), id.clone()))
                    .map(|kinds| (id.clone(), kinds.clone()))
            })
            .collect())
    }

    async fn save_match(&self, user_a: &str, user_b: &str, score: f64) -> Result<(), StoreError> {
        self.ensure_online()?;
        let record = MatchRecord::new(user_a, user_b, score);
        self.matches
            .write()
            .await
            .insert((record.user_low.clone(), record.user_high.clone()), record);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(!self.offline.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::distance::calculate_bounding_box;
    use crate::models::{Gender, GeoPoint, MatchFilters};
    use chrono::{Duration, Utc};

    const NYC: (f64, f64) = (40.7128, -74.0060);

    fn query(exclude: &str, bbox: bool) -> CandidateQuery {
        CandidateQuery {
            center: bbox.then(|| GeoPoint::new(NYC.0, NYC.1)),
            radius_km: 10.0,
            bounding_box: bbox.then(|| calculate_bounding_box(NYC.0, NYC.1, 10.0)),
            exclude_user_id: exclude.to_string(),
            filters: MatchFilters::default(),
            limit: 500,
            now: Utc::now(),
        }
    }

    fn store() -> InMemoryProfileStore {
        InMemoryProfileStore::with_profiles([
            Profile::new("a", 30, Gender::Man).with_location(NYC.0, NYC.1),
            Profile::new("b", 28, Gender::Woman).with_location(40.72, -74.01),
            Profile::new("c", 28, Gender::Woman).with_location(51.5, -0.12),
            Profile::new("d", 28, Gender::Woman),
        ])
    }

    #[tokio::test]
    async fn test_pool_excludes_requester() {
        let pool = store().get_candidate_pool(&query("a", false)).await.unwrap();
        let ids: Vec<&str> = pool.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_pool_bounding_box() {
        let pool = store().get_candidate_pool(&query("a", true)).await.unwrap();
        let ids: Vec<&str> = pool.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[tokio::test]
    async fn test_pool_drops_box_corners_outside_radius() {
        // Inside the 10 km box, ~12 km from the center
        let bbox = calculate_bounding_box(NYC.0, NYC.1, 10.0);
        let store = InMemoryProfileStore::with_profiles([
            Profile::new("corner", 28, Gender::Woman).with_location(bbox.max_lat - 0.005, bbox.max_lon - 0.005),
            Profile::new("inside", 28, Gender::Woman).with_location(40.75, -74.0),
        ]);

        let pool = store.get_candidate_pool(&query("a", true)).await.unwrap();
        let ids: Vec<&str> = pool.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["inside"]);
    }

    #[tokio::test]
    async fn test_pool_nearest_first_before_cap() {
        let store = InMemoryProfileStore::with_profiles([
            Profile::new("a_far", 28, Gender::Woman).with_location(40.78, -74.0),
            Profile::new("b_mid", 28, Gender::Woman).with_location(40.75, -74.0),
            Profile::new("z_near", 28, Gender::Woman).with_location(40.7130, -74.0060),
        ]);

        let mut q = query("me", true);
        q.limit = 2;
        let pool = store.get_candidate_pool(&q).await.unwrap();
        let ids: Vec<&str> = pool.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(ids, vec!["z_near", "b_mid"]);
    }

    #[tokio::test]
    async fn test_pool_applies_request_filters_before_cap() {
        let now = Utc::now();
        let mut online = Profile::new("z_online", 28, Gender::Woman).with_location(40.78, -74.0);
        online.last_active_at = Some(now - Duration::minutes(5));
        let mut fresh = Profile::new("z_fresh", 28, Gender::Woman).with_location(40.78, -74.01);
        fresh.created_at = Some(now - Duration::days(2));
        let store = InMemoryProfileStore::with_profiles([
            Profile::new("a", 28, Gender::Woman).with_location(40.7129, -74.0060),
            Profile::new("b", 28, Gender::Woman).with_location(40.7130, -74.0060),
            online,
            fresh,
        ]);

        let mut q = query("me", true);
        q.limit = 1;
        q.now = now;

        q.filters.online_only = true;
        let pool = store.get_candidate_pool(&q).await.unwrap();
        assert_eq!(pool[0].user_id, "z_online");

        q.filters.online_only = false;
        q.filters.new_users_only = true;
        let pool = store.get_candidate_pool(&q).await.unwrap();
        assert_eq!(pool[0].user_id, "z_fresh");
    }

    #[tokio::test]
    async fn test_save_match_upserts_pair() {
        let store = store();
        store.save_match("b", "a", 60.0).await.unwrap();
        store.save_match("a", "b", 72.5).await.unwrap();

        let saved = store.saved_matches().await;
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].score, 72.5);
    }

    #[tokio::test]
    async fn test_interactions_batch() {
        let store = store();
        store.record_interaction("a", "b", InteractionKind::Like).await;
        store.record_interaction("a", "b", InteractionKind::Message).await;
        store.record_interaction("b", "a", InteractionKind::Pass).await;

        let history = store
            .get_interactions("a", &["b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history["b"], vec![InteractionKind::Like, InteractionKind::Message]);
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = store();
        store.set_offline(true);
        assert!(matches!(store.get_profile("a").await, Err(StoreError::Unavailable(_))));
        assert!(!store.health_check().await.unwrap());
    }
}
