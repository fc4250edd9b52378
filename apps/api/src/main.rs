use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{BookingCollaborators, BookingWizardService, InMemoryWizardCache, RedisWizardCache, WizardCache};
use shared_config::AppConfig;

async fn wizard_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn WizardCache>> {
    match &config.redis_url {
        Some(redis_url) => {
            let cache = RedisWizardCache::new(redis_url, config.wizard_state_ttl_seconds).await?;
            Ok(Arc::new(cache))
        }
        None => {
            warn!("REDIS_URL not set, wizard state is kept in memory");
            Ok(Arc::new(InMemoryWizardCache::with_ttl(Duration::from_secs(
                config.wizard_state_ttl_seconds,
            ))))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking API server");

    // Load configuration
    let config = AppConfig::from_env();

    let collaborators = BookingCollaborators::http(&config, wizard_cache(&config).await?);
    let service = Arc::new(BookingWizardService::new(collaborators));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(redis_url: Option<&str>) -> AppConfig {
        AppConfig {
            location_mapping_api_url: "http://mapping".to_string(),
            locations_api_url: "http://locations".to_string(),
            booking_api_url: "http://bookings".to_string(),
            schedule_api_url: "http://schedules".to_string(),
            service_api_token: String::new(),
            redis_url: redis_url.map(str::to_string),
            wizard_state_ttl_seconds: 60,
            server_port: 0,
        }
    }

    #[tokio::test]
    async fn test_in_memory_wizard_cache_without_redis_url() {
        assert!(wizard_cache(&config(None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_startup() {
        assert!(wizard_cache(&config(Some("redis://127.0.0.1:1"))).await.is_err());
    }
}
