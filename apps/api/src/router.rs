use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, BookingWizardService};

pub fn create_router(service: Arc<BookingWizardService>) -> Router {
    Router::new()
        .route("/", get(|| async { "Booking API is running!" }))
        .nest("/appointments", appointment_routes(service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use appointment_cell::{BookingCollaborators, InMemoryWizardCache};
    use shared_config::AppConfig;

    fn config() -> AppConfig {
        AppConfig {
            location_mapping_api_url: "http://127.0.0.1:1".to_string(),
            locations_api_url: "http://127.0.0.1:1".to_string(),
            booking_api_url: "http://127.0.0.1:1".to_string(),
            schedule_api_url: "http://127.0.0.1:1".to_string(),
            service_api_token: String::new(),
            redis_url: None,
            wizard_state_ttl_seconds: 60,
            server_port: 0,
        }
    }

    fn app() -> Router {
        let collaborators = BookingCollaborators::http(&config(), Arc::new(InMemoryWizardCache::new()));
        create_router(Arc::new(BookingWizardService::new(collaborators)))
    }

    #[tokio::test]
    async fn test_root_responds() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_appointment_routes_are_nested() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/appointments/wizard/unknown/confirm")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"outcome":"redirect_to_start"}"#);
    }
}
