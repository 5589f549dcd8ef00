use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::time::Duration;

use crate::core::filters::{new_account_cutoff, online_cutoff};
use crate::models::{CandidateQuery, InteractionKind, MatchRecord, Profile, ProfileRecord};
use crate::services::store::{ProfileStore, StoreError};

/// PostgreSQL-backed profile store
///
/// Profiles live in `profiles` as a JSONB document alongside indexed
/// coordinate columns used for the bounding-box pre-filter. Rows that fail
/// normalization are skipped with a warning rather than failing the request.
pub struct PostgresProfileStore {
    pool: PgPool,
}

impl PostgresProfileStore {
    /// Create a new store from a connection string and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        Self::connect(database_url, max_connections, min_connections, 5, 600).await
    }

    /// Create a new store from settings
    pub async fn from_settings(
        url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
        acquire_timeout_secs: Option<u64>,
        idle_timeout_secs: Option<u64>,
    ) -> Result<Self, StoreError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::connect(
            url,
            max_connections.unwrap_or(10),
            min_connections.unwrap_or(1),
            acquire_timeout_secs.unwrap_or(5),
            idle_timeout_secs.unwrap_or(600),
        )
        .await
    }

    async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_secs: u64,
        idle_timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(idle_timeout_secs))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        // Run migrations on startup
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Insert or replace a raw profile document
    pub async fn upsert_record(&self, record: &ProfileRecord) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO profiles (user_id, latitude, longitude, last_active_at, created_at, data, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude,
                last_active_at = EXCLUDED.last_active_at,
                created_at = EXCLUDED.created_at,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
        "#;

        sqlx::query(query)
            .bind(&record.user_id)
            .bind(record.latitude)
            .bind(record.longitude)
            .bind(record.last_active_at)
            .bind(record.created_at)
            .bind(Json(record))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Record one interaction between two users
    pub async fn record_interaction(
        &self,
        user_id: &str,
        target_user_id: &str,
        kind: InteractionKind,
    ) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO interactions (user_id, target_user_id, kind, created_at)
            VALUES ($1, $2, $3, NOW())
        "#;

        sqlx::query(query)
            .bind(user_id)
            .bind(target_user_id)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn decode_profile(row: &PgRow) -> Option<Profile> {
        let user_id: String = row.try_get("user_id").unwrap_or_default();

        let record = match row.try_get::<Json<ProfileRecord>, _>("data") {
            Ok(Json(record)) => record,
            Err(e) => {
                tracing::warn!("Skipping unreadable profile row {}: {}", user_id, e);
                return None;
            }
        };

        match Profile::try_from(record) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Skipping invalid profile {}: {}", user_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl ProfileStore for PostgresProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        let query = r#"
            SELECT user_id, data
            FROM profiles
            WHERE user_id = $1
        "#;

        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let Json(record): Json<ProfileRecord> = row.try_get("data")?;
        Profile::try_from(record)
            .map(Some)
            .map_err(|e| StoreError::InvalidRecord(format!("{}: {}", user_id, e)))
    }

    async fn get_candidate_pool(&self, query: &CandidateQuery) -> Result<Vec<Profile>, StoreError> {
        let filters = &query.filters;
        let online_since = filters.online_only.then(|| online_cutoff(query.now));
        let created_after = filters.new_users_only.then(|| new_account_cutoff(query.now));

        let rows = match (&query.bounding_box, query.center) {
            (Some(bbox), Some(center)) => {
                // Equirectangular distance, fine at search-radius scale
                let sql = r#"
                    SELECT user_id, data
                    FROM (
                        SELECT user_id, data,
                               6371.0 * SQRT(
                                   POWER(RADIANS(latitude - $6), 2)
                                   + POWER(RADIANS(longitude - $7) * COS(RADIANS($6)), 2)
                               ) AS distance_km
                        FROM profiles
                        WHERE user_id <> $1
                          AND latitude BETWEEN $2 AND $3
                          AND longitude BETWEEN $4 AND $5
                          AND ($9::timestamptz IS NULL OR last_active_at >= $9)
                          AND ($10::timestamptz IS NULL OR created_at > $10)
                    ) AS candidates
                    WHERE distance_km <= $8
                    ORDER BY distance_km, user_id
                    LIMIT $11
                "#;

                sqlx::query(sql)
                    .bind(&query.exclude_user_id)
                    .bind(bbox.min_lat)
                    .bind(bbox.max_lat)
                    .bind(bbox.min_lon)
                    .bind(bbox.max_lon)
                    .bind(center.latitude)
                    .bind(center.longitude)
                    .bind(query.radius_km)
                    .bind(online_since)
                    .bind(created_after)
                    .bind(query.limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
            _ => {
                let sql = r#"
                    SELECT user_id, data
                    FROM profiles
                    WHERE user_id <> $1
                      AND ($2::timestamptz IS NULL OR last_active_at >= $2)
                      AND ($3::timestamptz IS NULL OR created_at > $3)
                    ORDER BY last_active_at DESC NULLS LAST, user_id
                    LIMIT $4
                "#;

                sqlx::query(sql)
                    .bind(&query.exclude_user_id)
                    .bind(online_since)
                    .bind(created_after)
                    .bind(query.limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let pool: Vec<Profile> = rows.iter().filter_map(Self::decode_profile).collect();

        tracing::debug!(
            "Loaded {} of {} candidate rows for {}",
            pool.len(),
            rows.len(),
            query.exclude_user_id
        );

        Ok(pool)
    }

    async fn get_interactions(
        &self,
        user_id: &str,
        candidate_ids: &[String],
    ) -> Result<HashMap<String, Vec<InteractionKind>>, StoreError> {
        if candidate_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = r#"
            SELECT target_user_id, kind
            FROM interactions
            WHERE user_id = $1 AND target_user_id = ANY($2)
            ORDER BY created_at
        "#;

        let rows = sqlx::query(query)
            .bind(user_id)
            .bind(candidate_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut history: HashMap<String, Vec<InteractionKind>> = HashMap::new();
        for row in &rows {
            let target: String = row.try_get("target_user_id")?;
            let raw: String = row.try_get("kind")?;
            match InteractionKind::parse(&raw) {
                Some(kind) => history.entry(target).or_default().push(kind),
                None => tracing::trace!("Ignoring unknown interaction kind {}", raw),
            }
        }

        Ok(history)
    }

    /// Uses INSERT ... ON CONFLICT so saving a pair again refreshes the score.
    async fn save_match(&self, user_a: &str, user_b: &str, score: f64) -> Result<(), StoreError> {
        let record = MatchRecord::new(user_a, user_b, score);

        let query = r#"
            INSERT INTO user_matches (id, user_low, user_high, score, match_type, matched_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_low, user_high)
            DO UPDATE SET
                score = EXCLUDED.score,
                matched_at = EXCLUDED.matched_at
        "#;

        sqlx::query(query)
            .bind(record.id)
            .bind(&record.user_low)
            .bind(&record.user_high)
            .bind(record.score)
            .bind(&record.match_type)
            .bind(record.matched_at)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            "Saved match {} <-> {} ({:.2})",
            record.user_low,
            record.user_high,
            record.score
        );

        Ok(())
    }

    /// Health check for the database connection
    async fn health_check(&self) -> Result<bool, StoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
