//! Concierge Door - access pipeline server
//!
//! Main entry point. Builds the capability clients from the environment and
//! serves the ingress API.

use concierge_door::{
    actuation_channel::HttpActuationChannel,
    identity_resolver::HttpFaceMatcher,
    notifier::WebhookNotifier,
    object_store::FsObjectStore,
    rate_limiter::{MemoryRateLimitStore, MySqlRateLimitStore, RateLimitStore},
    second_factor::{AuthorizationFunction, HttpFunctionInvoker},
    web_api, AppConfig, AppState, Capabilities,
};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pick the rate-limit store: MySQL when configured, in-process otherwise
async fn build_rate_limit_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RateLimitStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = MySqlPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await?;
            tracing::info!("Database connected");

            let store = MySqlRateLimitStore::new(pool, config.rate_limit_table.clone());
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, rate limiting uses in-process store (single instance only)");
            Ok(Arc::new(MemoryRateLimitStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "concierge_door=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Concierge Door v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!(
        bucket = %config.bucket_name,
        storage_root = %config.storage_root.display(),
        iot_topic = %config.iot_topic,
        face_matcher_url = %config.face_matcher_url,
        collection_id = %config.collection_id,
        open_rate_seconds = ?config.open_rate_seconds,
        second_factor = config.second_factor.is_some(),
        manual_trigger = config.trigger_token.is_some(),
        "Configuration loaded"
    );

    let object_store = Arc::new(
        FsObjectStore::new(
            config.storage_root.clone(),
            config.bucket_name.clone(),
            config.public_base_url.clone(),
        )
        .await?,
    );

    let rate_limit_store = match config.open_rate_seconds {
        Some(_) => Some(build_rate_limit_store(&config).await?),
        None => {
            tracing::info!("Rate limiting disabled (OPEN_RATE_SECONDS not set)");
            None
        }
    };

    let authorization: Option<Arc<dyn AuthorizationFunction>> = match &config.second_factor {
        Some(sf) => {
            tracing::info!(
                function = %sf.function,
                flagged_identities = sf.users.len(),
                "Second factor gate enabled"
            );
            Some(Arc::new(HttpFunctionInvoker::new(sf.endpoint.clone())?))
        }
        None => None,
    };

    let caps = Capabilities {
        face_matcher: Arc::new(HttpFaceMatcher::new(
            config.face_matcher_url.clone(),
            config.collection_id.clone(),
        )?),
        object_store,
        actuation: Arc::new(HttpActuationChannel::new(config.actuation_url.clone())?),
        notifier: Arc::new(WebhookNotifier::new(config.teams_webhook.clone())?),
        rate_limit_store,
        authorization,
    };

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::build(config, &caps)?;

    let app = web_api::create_router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
