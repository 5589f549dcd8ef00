use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use fwber_match::config::{LoggingSettings, Settings};
use fwber_match::core::{EngineSettings, MatchingEngine};
use fwber_match::routes::{self, AppState};
use fwber_match::services::{
    CacheManager, CachedProfileStore, InMemoryProfileStore, PostgresProfileStore, ProfileStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if logging.format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    tracing::error!("{}: {}", context, err);
    std::io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing(&LoggingSettings::default());
            return Err(startup_error("Failed to load configuration", e));
        }
    };

    init_tracing(&settings.logging);

    info!("Starting FWBer matching service...");

    let weights = settings
        .scoring
        .weights()
        .map_err(|e| startup_error("Invalid scoring weights", e))?;

    info!("Scoring with weights: {:?}", weights);

    let base_store: Arc<dyn ProfileStore> = match &settings.database.url {
        Some(url) => {
            let store = PostgresProfileStore::from_settings(
                url,
                settings.database.max_connections,
                settings.database.min_connections,
                settings.database.acquire_timeout_secs,
                settings.database.idle_timeout_secs,
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;
            info!("PostgreSQL profile store initialized");
            Arc::new(store)
        }
        None => {
            warn!("No database URL configured, using the in-memory profile store");
            Arc::new(InMemoryProfileStore::new())
        }
    };

    // Redis is optional; fall back to the in-process tier alone
    let cache = match CacheManager::new(
        settings.cache.redis_url.as_deref(),
        settings.cache.l1_cache_size,
        settings.cache.ttl_secs,
    )
    .await
    {
        Ok(cache) => cache,
        Err(e) => {
            warn!("Failed to connect to Redis ({}), using L1 cache only", e);
            CacheManager::in_memory(settings.cache.l1_cache_size, settings.cache.ttl_secs)
        }
    };

    info!(
        "Cache manager initialized (L1: {} entries, TTL: {}s, L2: {})",
        settings.cache.l1_cache_size,
        settings.cache.ttl_secs,
        cache.stats().l2_enabled
    );

    let store: Arc<dyn ProfileStore> = Arc::new(CachedProfileStore::new(base_store, cache));

    let engine = Arc::new(MatchingEngine::new(
        store,
        weights,
        EngineSettings::from(&settings.matching),
    ));

    let app_state = AppState {
        engine,
        request_timeout: Duration::from_millis(settings.matching.request_timeout_ms),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
