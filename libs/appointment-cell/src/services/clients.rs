// libs/appointment-cell/src/services/clients.rs
//! Ports to the record-keeping services this cell calls, and their HTTP adapters.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use shared_api_client::{ApiClient, ApiClientError};
use shared_config::AppConfig;

use crate::models::{AppointmentError, Booking, BookingRef, BookingRequest, ScheduledEvent};

impl From<ApiClientError> for AppointmentError {
    fn from(error: ApiClientError) -> Self {
        AppointmentError::ExternalServiceError(error.to_string())
    }
}

// ==============================================================================
// PORTS
// ==============================================================================

/// Numeric <-> opaque location id mapping.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LocationMappingApi: Send + Sync {
    async fn opaque_id_for_numeric(&self, numeric_id: i64) -> Result<Option<Uuid>, AppointmentError>;

    async fn numeric_id_for_opaque(&self, opaque_id: Uuid) -> Result<Option<i64>, AppointmentError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLocation {
    pub id: Uuid,
    pub key: String,
    pub display_name: Option<String>,
}

/// Location directory, keyed by opaque id or by key.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LocationsApi: Send + Sync {
    async fn get_by_opaque_id(&self, opaque_id: Uuid) -> Result<Option<DirectoryLocation>, AppointmentError>;

    async fn get_by_key(&self, key: &str) -> Result<Option<DirectoryLocation>, AppointmentError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, request: &BookingRequest) -> Result<BookingRef, AppointmentError>;

    /// Replaces the booking with `request`, which must describe the complete end state.
    async fn amend(&self, booking_ref: BookingRef, request: &BookingRequest) -> Result<(), AppointmentError>;

    async fn get(&self, booking_ref: BookingRef) -> Result<Option<Booking>, AppointmentError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScheduleApi: Send + Sync {
    async fn events_for_offender(
        &self,
        offender_ref: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduledEvent>, AppointmentError>;

    async fn events_for_location(
        &self,
        location_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ScheduledEvent>, AppointmentError>;
}

// ==============================================================================
// WIRE MODELS
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationMappingDto {
    nomis_location_id: i64,
    dps_location_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationDto {
    id: Uuid,
    key: String,
    local_name: Option<String>,
}

impl From<LocationDto> for DirectoryLocation {
    fn from(dto: LocationDto) -> Self {
        Self {
            id: dto.id,
            key: dto.key,
            display_name: dto.local_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedBookingDto {
    id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduledEventDto {
    offender_ref: String,
    location_id: Option<i64>,
    start_time: NaiveDateTime,
    end_time: NaiveDateTime,
    event_type: String,
    description: Option<String>,
}

impl From<ScheduledEventDto> for ScheduledEvent {
    fn from(dto: ScheduledEventDto) -> Self {
        Self {
            subject_id: dto.offender_ref,
            location_id: dto.location_id,
            start_time: dto.start_time,
            end_time: dto.end_time,
            event_type: dto.event_type,
            description: dto.description,
        }
    }
}

fn service_token(config: &AppConfig) -> Option<String> {
    Some(config.service_api_token.clone())
}

// ==============================================================================
// HTTP ADAPTERS
// ==============================================================================

pub struct HttpLocationMappingApi {
    client: ApiClient,
}

impl HttpLocationMappingApi {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: ApiClient::new(&config.location_mapping_api_url, service_token(config)),
        }
    }
}

#[async_trait]
impl LocationMappingApi for HttpLocationMappingApi {
    async fn opaque_id_for_numeric(&self, numeric_id: i64) -> Result<Option<Uuid>, AppointmentError> {
        let path = format!("/api/locations/nomis/{}", numeric_id);
        let mapping: Option<LocationMappingDto> = self.client.request_optional(&path).await?;
        Ok(mapping.map(|m| m.dps_location_id))
    }

    async fn numeric_id_for_opaque(&self, opaque_id: Uuid) -> Result<Option<i64>, AppointmentError> {
        let path = format!("/api/locations/dps/{}", opaque_id);
        let mapping: Option<LocationMappingDto> = self.client.request_optional(&path).await?;
        Ok(mapping.map(|m| m.nomis_location_id))
    }
}

pub struct HttpLocationsApi {
    client: ApiClient,
}

impl HttpLocationsApi {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: ApiClient::new(&config.locations_api_url, service_token(config)),
        }
    }
}

#[async_trait]
impl LocationsApi for HttpLocationsApi {
    async fn get_by_opaque_id(&self, opaque_id: Uuid) -> Result<Option<DirectoryLocation>, AppointmentError> {
        let path = format!("/locations/{}", opaque_id);
        let location: Option<LocationDto> = self.client.request_optional(&path).await?;
        Ok(location.map(DirectoryLocation::from))
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<DirectoryLocation>, AppointmentError> {
        let path = format!("/locations/key/{}", urlencoding::encode(key));
        let location: Option<LocationDto> = self.client.request_optional(&path).await?;
        Ok(location.map(DirectoryLocation::from))
    }
}

pub struct HttpBookingStore {
    client: ApiClient,
}

impl HttpBookingStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: ApiClient::new(&config.booking_api_url, service_token(config)),
        }
    }
}

#[async_trait]
impl BookingStore for HttpBookingStore {
    async fn create(&self, request: &BookingRequest) -> Result<BookingRef, AppointmentError> {
        debug!(
            "Creating {} booking with {} legs for {}",
            request.booking_type,
            request.sub_appointments.len(),
            request.offender_ref
        );

        let created: CreatedBookingDto = self.client.request(Method::POST, "/bookings", Some(request)).await?;
        Ok(BookingRef(created.id))
    }

    async fn amend(&self, booking_ref: BookingRef, request: &BookingRequest) -> Result<(), AppointmentError> {
        debug!("Amending booking {} with {} legs", booking_ref, request.sub_appointments.len());

        let path = format!("/bookings/{}", booking_ref);
        self.client.execute(Method::PUT, &path, Some(request)).await?;
        Ok(())
    }

    async fn get(&self, booking_ref: BookingRef) -> Result<Option<Booking>, AppointmentError> {
        let path = format!("/bookings/{}", booking_ref);
        Ok(self.client.request_optional(&path).await?)
    }
}

pub struct HttpScheduleApi {
    client: ApiClient,
}

impl HttpScheduleApi {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: ApiClient::new(&config.schedule_api_url, service_token(config)),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<ScheduledEvent>, AppointmentError> {
        let events: Vec<ScheduledEventDto> = self.client.request::<_, ()>(Method::GET, path, None).await?;
        Ok(events.into_iter().map(ScheduledEvent::from).collect())
    }
}

#[async_trait]
impl ScheduleApi for HttpScheduleApi {
    async fn events_for_offender(
        &self,
        offender_ref: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduledEvent>, AppointmentError> {
        let path = format!(
            "/schedules/offender/{}?date={}",
            urlencoding::encode(offender_ref),
            date.format("%Y-%m-%d")
        );
        self.fetch(&path).await
    }

    async fn events_for_location(
        &self,
        location_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ScheduledEvent>, AppointmentError> {
        let path = format!("/schedules/location/{}?date={}", location_id, date.format("%Y-%m-%d"));
        self.fetch(&path).await
    }
}
