use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use atlas_screening::config::{CacheBackend, Settings};
use atlas_screening::core::{ResponseClassifier, Screener};
use atlas_screening::routes::{self, screenings::AppState};
use atlas_screening::services::{
    AnalysisClient, AtlasClient, AtlasCredentials, CacheStore, MemoryCacheStore,
    PostgresCacheStore, RedisCacheStore,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
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

fn init_logging(level: &str, format: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn config_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
}

async fn build_store(settings: &Settings) -> io::Result<Arc<dyn CacheStore>> {
    match settings.cache.backend {
        CacheBackend::Postgres => {
            let database = settings
                .database
                .as_ref()
                .ok_or_else(|| config_error("cache.backend = postgres requires a [database] section"))?;

            let store = PostgresCacheStore::from_settings(
                &database.url,
                database.max_connections,
                database.min_connections,
                database.acquire_timeout_secs,
                database.idle_timeout_secs,
            )
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
            })?;

            info!(
                "PostgreSQL cache store initialized (max: {} connections)",
                database.max_connections.unwrap_or(10)
            );
            Ok(Arc::new(store))
        }
        CacheBackend::Redis => {
            let redis_url = settings
                .cache
                .redis_url
                .as_deref()
                .ok_or_else(|| config_error("cache.backend = redis requires cache.redis_url"))?;

            let store = RedisCacheStore::new(redis_url).await.map_err(|e| {
                error!("Failed to connect to Redis: {}", e);
                io::Error::new(io::ErrorKind::ConnectionRefused, e.to_string())
            })?;

            info!("Redis cache store initialized");
            Ok(Arc::new(store))
        }
        CacheBackend::Memory => {
            warn!("Using in-memory cache store, cached screenings are lost on restart");
            Ok(Arc::new(MemoryCacheStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(config_error(e));
        }
    };

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting Atlas screening service...");
    info!("Configuration loaded successfully");

    let store = build_store(&settings).await?;

    let provider = AtlasClient::new(
        settings.provider.base_url.clone(),
        AtlasCredentials {
            email: settings.provider.email.clone(),
            password: settings.provider.password.clone(),
        },
        settings.provider.check_type.clone(),
        Duration::from_secs(settings.provider.timeout_secs),
        Duration::from_secs(settings.provider.token_ttl_secs),
    )
    .map_err(config_error)?;

    info!(
        "Screening provider client initialized ({}, check: {})",
        settings.provider.base_url, settings.provider.check_type
    );

    let policy = settings.screening_policy();
    let classifier = ResponseClassifier::new(settings.provider.check_type.clone());
    let mut screener = Screener::new(store, Arc::new(provider), classifier);

    match (settings.enrichment.enabled, settings.enrichment.endpoint.clone()) {
        (true, Some(endpoint)) => {
            let analysis = AnalysisClient::new(endpoint, policy.enrichment_timeout).map_err(config_error)?;
            screener = screener.with_enricher(Arc::new(analysis));
            info!("Risk enrichment enabled");
        }
        (true, None) => warn!("Enrichment enabled without an endpoint, continuing without it"),
        (false, _) => info!("Risk enrichment disabled"),
    }

    info!(
        "Screener initialized (ttl: {}h, name-only reuse: {})",
        policy.cache_ttl.num_hours(),
        policy.allow_name_only_reuse
    );

    let app_state = AppState {
        screener: Arc::new(screener.with_policy(policy)),
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
