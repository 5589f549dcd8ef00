// Integration tests for FWBer Match

use actix_web::{http::StatusCode, test, web, App};
use chrono::{Duration, Utc};
use fwber_match::core::{EngineSettings, MatchError, MatchingEngine};
use fwber_match::models::{
    FindMatchesResponse, Gender, MatchFilters, PreferenceTag, Profile, ScoringPreset, ScoringWeights,
};
use fwber_match::routes::{configure_routes, AppState};
use fwber_match::services::{CacheManager, CachedProfileStore, InMemoryProfileStore, ProfileStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn create_test_profile(id: &str, age: u8, gender: Gender, wants: Gender, lat: f64, lon: f64) -> Profile {
    let mut profile = Profile::new(id, age, gender).with_location(lat, lon);
    profile.wants.insert(PreferenceTag::Gender(wants));
    profile
}

fn seeded_store() -> Arc<InMemoryProfileStore> {
    let now = Utc::now();
    let mut online = create_test_profile("3", 30, Gender::Woman, Gender::Man, 40.71, -74.00);
    online.last_active_at = Some(now - Duration::minutes(5));
    let mut fresh = create_test_profile("4", 22, Gender::Woman, Gender::Man, 40.70, -73.99);
    fresh.created_at = Some(now - Duration::days(1));

    Arc::new(InMemoryProfileStore::with_profiles([
        create_test_profile("me", 29, Gender::Man, Gender::Woman, 40.7128, -74.0060),
        create_test_profile("1", 25, Gender::Woman, Gender::Man, 40.72, -74.01),
        create_test_profile("2", 28, Gender::Woman, Gender::Man, 40.73, -74.02),
        online,
        fresh,
        create_test_profile("5", 26, Gender::Man, Gender::Man, 40.72, -74.01), // Wrong gender
        create_test_profile("6", 25, Gender::Woman, Gender::Woman, 40.72, -74.01), // Not interested
        create_test_profile("7", 25, Gender::Woman, Gender::Man, 41.5, -74.0), // ~90 km
    ]))
}

fn engine_over(store: Arc<InMemoryProfileStore>) -> MatchingEngine<Arc<InMemoryProfileStore>> {
    MatchingEngine::new(store, ScoringWeights::default(), EngineSettings::default())
}

fn app_state(store: Arc<InMemoryProfileStore>) -> AppState {
    app_state_with(store, ScoringWeights::default())
}

fn app_state_with(store: Arc<InMemoryProfileStore>, weights: ScoringWeights) -> AppState {
    let store: Arc<dyn ProfileStore> = store;
    AppState {
        engine: Arc::new(MatchingEngine::new(store, weights, EngineSettings::default())),
        request_timeout: StdDuration::from_secs(5),
    }
}

#[tokio::test]
async fn test_integration_end_to_end_matching() {
    let engine = engine_over(seeded_store());

    let result = engine.rank("me", &MatchFilters::default(), Some(10)).await.unwrap();
    let ids: Vec<&str> = result.matches.iter().map(|m| m.candidate_id()).collect();

    // "7" lies outside the default 50 km radius and never enters the pool
    assert_eq!(result.total_candidates, 6);
    assert_eq!(result.matches.len(), 4);
    assert!(!ids.contains(&"5"));
    assert!(!ids.contains(&"6"));
    assert!(!ids.contains(&"7"));

    for m in &result.matches {
        assert_eq!(m.candidate.gender, Gender::Woman);
        assert_eq!(m.breakdown.len(), 6);
    }

    // Results should be sorted by score descending
    for pair in result.matches.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_integration_request_filters() {
    let engine = engine_over(seeded_store());

    let near = MatchFilters {
        max_distance_km: Some(20.0),
        ..Default::default()
    };
    let result = engine.rank("me", &near, None).await.unwrap();
    assert!(result.matches.iter().all(|m| m.distance_km <= 20.0));
    assert!(result.matches.iter().all(|m| m.candidate_id() != "7"));

    let online = MatchFilters {
        online_only: true,
        ..Default::default()
    };
    let result = engine.rank("me", &online, None).await.unwrap();
    let ids: Vec<&str> = result.matches.iter().map(|m| m.candidate_id()).collect();
    assert_eq!(ids, vec!["3"]);

    let new_users = MatchFilters {
        new_users_only: true,
        ..Default::default()
    };
    let result = engine.rank("me", &new_users, None).await.unwrap();
    let ids: Vec<&str> = result.matches.iter().map(|m| m.candidate_id()).collect();
    assert_eq!(ids, vec!["4"]);
}

#[tokio::test]
async fn test_integration_bounded_pool_keeps_near_online_candidate() {
    let now = Utc::now();
    let mut near = create_test_profile("z_near", 27, Gender::Woman, Gender::Man, 40.7129, -74.0060);
    near.last_active_at = Some(now - Duration::minutes(5));
    let store = Arc::new(InMemoryProfileStore::with_profiles([
        create_test_profile("me", 29, Gender::Man, Gender::Woman, 40.7128, -74.0060),
        create_test_profile("a_london", 27, Gender::Woman, Gender::Man, 51.5074, -0.1278),
        create_test_profile("b_london", 27, Gender::Woman, Gender::Man, 51.5080, -0.1280),
        near,
    ]));
    let settings = EngineSettings {
        pool_limit: 2,
        ..EngineSettings::default()
    };
    let engine = MatchingEngine::new(store, ScoringWeights::default(), settings);

    let result = engine.rank_at("me", &MatchFilters::default(), None, now).await.unwrap();
    let ids: Vec<&str> = result.matches.iter().map(|m| m.candidate_id()).collect();
    assert_eq!(ids, vec!["z_near"]);

    let online = MatchFilters {
        online_only: true,
        ..Default::default()
    };
    let result = engine.rank_at("me", &online, None, now).await.unwrap();
    let ids: Vec<&str> = result.matches.iter().map(|m| m.candidate_id()).collect();
    assert_eq!(ids, vec!["z_near"]);
}

#[tokio::test]
async fn test_integration_errors_are_distinct_from_empty() {
    let store = Arc::new(InMemoryProfileStore::with_profiles([create_test_profile(
        "alone",
        30,
        Gender::Man,
        Gender::Woman,
        0.0,
        0.0,
    )]));
    let engine = engine_over(store);

    let empty = engine.rank("alone", &MatchFilters::default(), None).await.unwrap();
    assert!(empty.matches.is_empty());

    assert!(matches!(
        engine.rank("ghost", &MatchFilters::default(), None).await,
        Err(MatchError::ProfileNotFound(_))
    ));
    assert!(matches!(
        engine.rank("alone", &MatchFilters::default(), Some(0)).await,
        Err(MatchError::InvalidFilter(_))
    ));
}

#[tokio::test]
async fn test_integration_cached_store_ranks_identically() {
    let store = seeded_store();
    let cached: Arc<dyn ProfileStore> = Arc::new(CachedProfileStore::new(
        store.clone(),
        CacheManager::in_memory(100, 60),
    ));
    let plain = engine_over(store);
    let cached = MatchingEngine::new(cached, ScoringWeights::default(), EngineSettings::default());

    let now = Utc::now();
    let a = plain.rank_at("me", &MatchFilters::default(), None, now).await.unwrap();
    let b = cached.rank_at("me", &MatchFilters::default(), None, now).await.unwrap();
    let b_again = cached.rank_at("me", &MatchFilters::default(), None, now).await.unwrap();

    let ids = |r: &fwber_match::core::MatchResult| -> Vec<(String, f64)> {
        r.matches.iter().map(|m| (m.candidate_id().to_string(), m.score)).collect()
    };
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(ids(&b), ids(&b_again));
}

#[actix_web::test]
async fn test_http_find_matches() {
    let store = seeded_store();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(store.clone())))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(json!({ "userId": "me", "limit": 3, "save": true }))
        .to_request();
    let resp: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp.matches.len(), 3);
    assert_eq!(resp.total_results, 3);
    assert!(resp.matches[0].breakdown.contains_key("location"));
    assert_eq!(resp.total_candidates, 6);
    assert!(resp.matches[0].breakdown.contains_key("physical"));
    assert_eq!(store.saved_matches().await.len(), 3);
}

#[actix_web::test]
async fn test_http_affinity_breakdown_uses_factor_names() {
    let weights = ScoringWeights::preset(ScoringPreset::Affinity);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state_with(seeded_store(), weights)))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(json!({ "userId": "me", "limit": 1 }))
        .to_request();
    let resp: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

    let mut keys: Vec<&str> = resp.matches[0].breakdown.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["activity", "age", "avatar", "interaction", "interests", "location"]
    );
}

#[actix_web::test]
async fn test_http_error_statuses() {
    let store = seeded_store();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(store.clone())))
            .configure(configure_routes),
    )
    .await;

    let cases = [
        (json!({ "userId": "ghost" }), StatusCode::NOT_FOUND),
        (json!({ "userId": "me", "limit": 0 }), StatusCode::BAD_REQUEST),
        (json!({ "userId": "me", "limit": -4 }), StatusCode::BAD_REQUEST),
        (json!({ "userId": "me", "maxDistanceKm": -1.0 }), StatusCode::BAD_REQUEST),
        (json!({ "userId": "" }), StatusCode::BAD_REQUEST),
    ];

    for (body, status) in cases {
        let req = test::TestRequest::post()
            .uri("/api/v1/matches/find")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), status, "body: {body}");
    }

    store.set_offline(true);
    let req = test::TestRequest::post()
        .uri("/api/v1/matches/find")
        .set_json(json!({ "userId": "me" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_http_save_match_and_health() {
    let store = seeded_store();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(app_state(store.clone())))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/save")
        .set_json(json!({ "userId": "me", "targetUserId": "1", "score": 81.5 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.saved_matches().await[0].score, 81.5);

    let req = test::TestRequest::post()
        .uri("/api/v1/matches/save")
        .set_json(json!({ "userId": "me", "targetUserId": "1", "score": 120.0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");
}
