use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, BookingRef, BookingRequest, BookingType, LegType, SubAppointment,
};
use appointment_cell::services::clients::{
    BookingStore, HttpBookingStore, HttpLocationMappingApi, HttpLocationsApi, HttpScheduleApi,
    LocationMappingApi, LocationsApi, ScheduleApi,
};
use shared_config::AppConfig;
use shared_utils::test_utils::{test_datetime, MockBackendResponses, TestConfig};

fn config(server: &MockServer) -> AppConfig {
    TestConfig::with_backend(&server.uri()).to_app_config()
}

fn opaque_id() -> Uuid {
    Uuid::parse_str("0f3c9a1e-2b7d-4c55-9e0a-7d4f1b2c3a4e").unwrap()
}

#[tokio::test]
async fn test_location_mapping_both_directions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/locations/nomis/25001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockBackendResponses::location_mapping(25001, opaque_id())))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/locations/dps/{}", opaque_id())))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockBackendResponses::location_mapping(25001, opaque_id())))
        .mount(&server)
        .await;

    let api = HttpLocationMappingApi::new(&config(&server));

    assert_eq!(api.opaque_id_for_numeric(25001).await.unwrap(), Some(opaque_id()));
    assert_eq!(api.numeric_id_for_opaque(opaque_id()).await.unwrap(), Some(25001));
}

#[tokio::test]
async fn test_missing_mapping_is_none_and_outage_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/locations/nomis/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/locations/nomis/2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let api = HttpLocationMappingApi::new(&config(&server));

    assert_eq!(api.opaque_id_for_numeric(1).await.unwrap(), None);
    assert_matches!(
        api.opaque_id_for_numeric(2).await,
        Err(AppointmentError::ExternalServiceError(_))
    );
}

#[tokio::test]
async fn test_directory_lookups() {
    let server = MockServer::start().await;
    let location = MockBackendResponses::directory_location(opaque_id(), "MDI-VCC-1", "Video court room 1");

    Mock::given(method("GET"))
        .and(path(format!("/locations/{}", opaque_id())))
        .respond_with(ResponseTemplate::new(200).set_body_json(location.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locations/key/MDI-VCC-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(location))
        .mount(&server)
        .await;

    let api = HttpLocationsApi::new(&config(&server));

    let by_id = api.get_by_opaque_id(opaque_id()).await.unwrap().unwrap();
    assert_eq!(by_id.key, "MDI-VCC-1");
    assert_eq!(by_id.display_name.as_deref(), Some("Video court room 1"));

    let by_key = api.get_by_key("MDI-VCC-1").await.unwrap().unwrap();
    assert_eq!(by_key.id, opaque_id());

    assert!(api.get_by_key("MDI-NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn test_schedule_events_are_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/schedules/offender/A1234BC"))
        .and(query_param("date", "2024-01-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockBackendResponses::scheduled_event("A1234BC", 25001, "2024-01-10", "09:45", "10:00"),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/schedules/location/25001"))
        .and(query_param("date", "2024-01-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let api = HttpScheduleApi::new(&config(&server));
    let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();

    let events = api.events_for_offender("A1234BC", date).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].subject_id, "A1234BC");
    assert_eq!(events[0].location_id, Some(25001));
    assert_eq!(events[0].start_time, test_datetime("2024-01-10", "09:45"));
    assert_eq!(events[0].end_time, test_datetime("2024-01-10", "10:00"));

    assert!(api.events_for_location(25001, date).await.unwrap().is_empty());
}

fn request() -> BookingRequest {
    BookingRequest {
        booking_type: BookingType::Simple,
        offender_ref: "A1234BC".to_string(),
        sub_appointments: vec![SubAppointment::spanning(
            LegType::Main,
            "MDI-VCC-1",
            test_datetime("2024-01-10", "10:00"),
            test_datetime("2024-01-10", "11:00"),
        )],
        recurrence: None,
        series_end_date: None,
        video_link: None,
        comment: None,
    }
}

#[tokio::test]
async fn test_booking_store_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bookings"))
        .and(body_partial_json(json!({ "offender_ref": "A1234BC" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 31 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/bookings/31"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings/31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "booking_ref": 31,
            "booking_type": "SIMPLE",
            "offender_ref": "A1234BC",
            "sub_appointments": [{
                "leg_type": "MAIN",
                "location_key": "MDI-VCC-1",
                "date": "2024-01-10",
                "start_time": "10:00:00",
                "end_time": "11:00:00"
            }],
            "recurrence": null,
            "video_link": null,
            "comment": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings/32"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = HttpBookingStore::new(&config(&server));

    let booking_ref = store.create(&request()).await.unwrap();
    assert_eq!(booking_ref, BookingRef(31));

    store.amend(booking_ref, &request()).await.unwrap();

    let booking = store.get(booking_ref).await.unwrap().unwrap();
    assert_eq!(booking.sub_appointments, request().sub_appointments);

    assert!(store.get(BookingRef(32)).await.unwrap().is_none());
}
