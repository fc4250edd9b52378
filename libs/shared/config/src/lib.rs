use std::env;
use tracing::warn;

const DEFAULT_WIZARD_STATE_TTL_SECONDS: u64 = 3600;
const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub location_mapping_api_url: String,
    pub locations_api_url: String,
    pub booking_api_url: String,
    pub schedule_api_url: String,
    pub service_api_token: String,
    pub redis_url: Option<String>,
    pub wizard_state_ttl_seconds: u64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            location_mapping_api_url: env::var("LOCATION_MAPPING_API_URL")
                .unwrap_or_else(|_| {
                    warn!("LOCATION_MAPPING_API_URL not set, using empty value");
                    String::new()
                }),
            locations_api_url: env::var("LOCATIONS_API_URL")
                .unwrap_or_else(|_| {
                    warn!("LOCATIONS_API_URL not set, using empty value");
                    String::new()
                }),
            booking_api_url: env::var("BOOKING_API_URL")
                .unwrap_or_else(|_| {
                    warn!("BOOKING_API_URL not set, using empty value");
                    String::new()
                }),
            schedule_api_url: env::var("SCHEDULE_API_URL")
                .unwrap_or_else(|_| {
                    warn!("SCHEDULE_API_URL not set, using empty value");
                    String::new()
                }),
            service_api_token: env::var("SERVICE_API_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("SERVICE_API_TOKEN not set, backend calls will be unauthenticated");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok(),
            wizard_state_ttl_seconds: env::var("WIZARD_STATE_TTL_SECONDS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or_else(|| {
                    warn!("WIZARD_STATE_TTL_SECONDS not set or invalid, using default");
                    DEFAULT_WIZARD_STATE_TTL_SECONDS
                }),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing backend service URLs");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.location_mapping_api_url.is_empty()
            && !self.locations_api_url.is_empty()
            && !self.booking_api_url.is_empty()
            && !self.schedule_api_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> AppConfig {
        AppConfig {
            location_mapping_api_url: "http://mapping".to_string(),
            locations_api_url: "http://locations".to_string(),
            booking_api_url: "http://bookings".to_string(),
            schedule_api_url: "http://schedules".to_string(),
            service_api_token: String::new(),
            redis_url: None,
            wizard_state_ttl_seconds: DEFAULT_WIZARD_STATE_TTL_SECONDS,
            server_port: DEFAULT_SERVER_PORT,
        }
    }

    #[test]
    fn test_is_configured_requires_every_backend() {
        assert!(configured().is_configured());

        let mut config = configured();
        config.schedule_api_url = String::new();
        assert!(!config.is_configured());
    }
}
