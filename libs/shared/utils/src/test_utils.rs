use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub backend_url: String,
    pub service_api_token: String,
    pub wizard_state_ttl_seconds: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8089".to_string(),
            service_api_token: "test-service-token".to_string(),
            wizard_state_ttl_seconds: 600,
        }
    }
}

impl TestConfig {
    /// Points every backend at the same base URL, which is what a single wiremock server wants.
    pub fn with_backend(url: &str) -> Self {
        Self {
            backend_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            location_mapping_api_url: self.backend_url.clone(),
            locations_api_url: self.backend_url.clone(),
            booking_api_url: self.backend_url.clone(),
            schedule_api_url: self.backend_url.clone(),
            service_api_token: self.service_api_token.clone(),
            redis_url: None,
            wizard_state_ttl_seconds: self.wizard_state_ttl_seconds,
            server_port: 0,
        }
    }
}

pub fn test_datetime(date: &str, time: &str) -> NaiveDateTime {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("valid test date");
    let time = NaiveTime::parse_from_str(time, "%H:%M").expect("valid test time");
    date.and_time(time)
}

/// Canned backend payloads in the camelCase shape the record-keeping services return.
pub struct MockBackendResponses;

impl MockBackendResponses {
    pub fn location_mapping(numeric_id: i64, opaque_id: Uuid) -> Value {
        json!({
            "nomisLocationId": numeric_id,
            "dpsLocationId": opaque_id,
        })
    }

    pub fn directory_location(opaque_id: Uuid, key: &str, display_name: &str) -> Value {
        json!({
            "id": opaque_id,
            "key": key,
            "localName": display_name,
        })
    }

    pub fn scheduled_event(subject_id: &str, location_id: i64, date: &str, start: &str, end: &str) -> Value {
        json!({
            "offenderRef": subject_id,
            "locationId": location_id,
            "startTime": format!("{}T{}:00", date, start),
            "endTime": format!("{}T{}:00", date, end),
            "eventType": "VLB",
            "description": "Video link booking",
        })
    }
}
