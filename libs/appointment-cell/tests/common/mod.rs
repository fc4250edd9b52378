#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, Booking, BookingRef, BookingRequest, ScheduledEvent,
};
use appointment_cell::services::booking::{BookingCollaborators, BookingWizardService, FixedClock};
use appointment_cell::services::clients::{
    BookingStore, DirectoryLocation, LocationMappingApi, LocationsApi, ScheduleApi,
};
use appointment_cell::services::wizard::InMemoryWizardCache;
use shared_utils::test_utils::test_datetime;

pub const OFFENDER: &str = "A1234BC";

/// Room 1 (MDI-VCC-1), 2 (MDI-VCC-2) and 3 (MDI-VCC-3) are fully mapped. Room 99 exists in
/// the legacy system only.
pub struct FakeLocations {
    rooms: Vec<(i64, Uuid, String)>,
}

impl FakeLocations {
    pub fn new() -> Self {
        Self {
            rooms: (1..=3)
                .map(|id| (id, Uuid::from_u128(id as u128), format!("MDI-VCC-{}", id)))
                .collect(),
        }
    }
}

#[async_trait]
impl LocationMappingApi for FakeLocations {
    async fn opaque_id_for_numeric(&self, numeric_id: i64) -> Result<Option<Uuid>, AppointmentError> {
        Ok(self.rooms.iter().find(|(id, _, _)| *id == numeric_id).map(|(_, opaque, _)| *opaque))
    }

    async fn numeric_id_for_opaque(&self, opaque_id: Uuid) -> Result<Option<i64>, AppointmentError> {
        Ok(self.rooms.iter().find(|(_, opaque, _)| *opaque == opaque_id).map(|(id, _, _)| *id))
    }
}

#[async_trait]
impl LocationsApi for FakeLocations {
    async fn get_by_opaque_id(&self, opaque_id: Uuid) -> Result<Option<DirectoryLocation>, AppointmentError> {
        Ok(self
            .rooms
            .iter()
            .find(|(_, opaque, _)| *opaque == opaque_id)
            .map(|(_, opaque, key)| DirectoryLocation {
                id: *opaque,
                key: key.clone(),
                display_name: Some(format!("Video room {}", key)),
            }))
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<DirectoryLocation>, AppointmentError> {
        Ok(self
            .rooms
            .iter()
            .find(|(_, _, k)| k == key)
            .map(|(_, opaque, key)| DirectoryLocation {
                id: *opaque,
                key: key.clone(),
                display_name: Some(format!("Video room {}", key)),
            }))
    }
}

/// Keeps bookings in memory and publishes their legs as scheduled events.
#[derive(Default)]
pub struct FakeBookingStore {
    bookings: Mutex<HashMap<BookingRef, Booking>>,
    pub creates: Mutex<Vec<BookingRequest>>,
    pub amends: Mutex<Vec<(BookingRef, BookingRequest)>>,
}

impl FakeBookingStore {
    pub fn insert(&self, booking: Booking) {
        self.bookings.lock().unwrap().insert(booking.booking_ref, booking);
    }

    pub fn booking(&self, booking_ref: BookingRef) -> Option<Booking> {
        self.bookings.lock().unwrap().get(&booking_ref).cloned()
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().unwrap().len()
    }

    fn stored(booking_ref: BookingRef, request: &BookingRequest) -> Booking {
        Booking {
            booking_ref,
            booking_type: request.booking_type,
            offender_ref: request.offender_ref.clone(),
            sub_appointments: request.sub_appointments.clone(),
            recurrence: request.recurrence,
            video_link: request.video_link.clone(),
            comment: request.comment.clone(),
        }
    }
}

#[async_trait]
impl BookingStore for FakeBookingStore {
    async fn create(&self, request: &BookingRequest) -> Result<BookingRef, AppointmentError> {
        let mut bookings = self.bookings.lock().unwrap();
        let booking_ref = BookingRef(1000 + bookings.len() as i64);
        bookings.insert(booking_ref, Self::stored(booking_ref, request));
        self.creates.lock().unwrap().push(request.clone());
        Ok(booking_ref)
    }

    async fn amend(&self, booking_ref: BookingRef, request: &BookingRequest) -> Result<(), AppointmentError> {
        let mut bookings = self.bookings.lock().unwrap();
        if !bookings.contains_key(&booking_ref) {
            return Err(AppointmentError::BookingNotFound(booking_ref));
        }
        bookings.insert(booking_ref, Self::stored(booking_ref, request));
        self.amends.lock().unwrap().push((booking_ref, request.clone()));
        Ok(())
    }

    async fn get(&self, booking_ref: BookingRef) -> Result<Option<Booking>, AppointmentError> {
        Ok(self.booking(booking_ref))
    }
}

/// Schedule made of fixed events plus every leg currently held by the store.
pub struct FakeSchedule {
    store: Arc<FakeBookingStore>,
    pub extra_events: Vec<ScheduledEvent>,
}

impl FakeSchedule {
    fn events(&self) -> Vec<ScheduledEvent> {
        let bookings = self.store.bookings.lock().unwrap();
        let mut events: Vec<ScheduledEvent> = bookings
            .values()
            .flat_map(|booking| {
                booking.sub_appointments.iter().map(move |leg| ScheduledEvent {
                    subject_id: booking.offender_ref.clone(),
                    location_id: room_id(&leg.location_key),
                    start_time: leg.starts_at(),
                    end_time: leg.ends_at(),
                    event_type: "VLB".to_string(),
                    description: None,
                })
            })
            .collect();
        events.extend(self.extra_events.iter().cloned());
        events
    }
}

fn room_id(key: &str) -> Option<i64> {
    key.strip_prefix("MDI-VCC-").and_then(|id| id.parse().ok())
}

#[async_trait]
impl ScheduleApi for FakeSchedule {
    async fn events_for_offender(
        &self,
        offender_ref: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduledEvent>, AppointmentError> {
        Ok(self
            .events()
            .into_iter()
            .filter(|event| event.subject_id == offender_ref && event.start_time.date() == date)
            .collect())
    }

    async fn events_for_location(
        &self,
        location_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<ScheduledEvent>, AppointmentError> {
        Ok(self
            .events()
            .into_iter()
            .filter(|event| event.location_id == Some(location_id) && event.start_time.date() == date)
            .collect())
    }
}

pub struct TestHarness {
    pub service: Arc<BookingWizardService>,
    pub store: Arc<FakeBookingStore>,
}

pub fn now() -> NaiveDateTime {
    test_datetime("2024-01-09", "12:00")
}

pub fn harness(extra_events: Vec<ScheduledEvent>) -> TestHarness {
    let locations = Arc::new(FakeLocations::new());
    let store = Arc::new(FakeBookingStore::default());
    let schedule = Arc::new(FakeSchedule {
        store: Arc::clone(&store),
        extra_events,
    });

    let collaborators = BookingCollaborators {
        mapping: locations.clone(),
        locations,
        store: store.clone(),
        schedule,
        wizard_cache: Arc::new(InMemoryWizardCache::new()),
    };

    TestHarness {
        service: Arc::new(BookingWizardService::with_clock(collaborators, Arc::new(FixedClock(now())))),
        store,
    }
}
