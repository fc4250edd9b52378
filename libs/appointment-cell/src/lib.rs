// libs/appointment-cell/src/lib.rs
//! # Appointment Cell
//!
//! Composes prison appointments and video-link bookings from what staff enter in a
//! multi-step wizard, and reconciles them with the record-keeping services that hold
//! locations, bookings and schedules.
//!
//! ## Architecture
//!
//! ```text
//! +-----------------------------------------------------+
//! |                  Appointment Cell                   |
//! +-----------------------------------------------------+
//! |  handlers.rs     |  HTTP endpoint handlers          |
//! |  router.rs       |  Route definitions               |
//! |  models.rs       |  Domain types, forms, errors     |
//! |  services/       |  Business logic layer            |
//! |    booking.rs    |  Wizard steps                    |
//! |    clients.rs    |  Collaborator ports + adapters   |
//! |    composer.rs   |  PRE / MAIN / POST legs          |
//! |    conflict.rs   |  Availability and own-leg filter |
//! |    lifecycle.rs  |  Create or amend                 |
//! |    location.rs   |  Location identity resolution    |
//! |    recurrence.rs |  Repeating series dates          |
//! |    validation.rs |  Form validation                 |
//! |    wizard.rs     |  Wizard state by handle          |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /prisoners/{offender_ref}/appointments/details` - Submit appointment details
//! - `POST /prisoners/{offender_ref}/bookings/{booking_ref}/amend` - Start amending a booking
//! - `GET /wizard/{handle}` - Current wizard state
//! - `POST /wizard/{handle}/video-link-details` - Submit court or probation details
//! - `GET /wizard/{handle}/availability` - Check what else is booked
//! - `POST /wizard/{handle}/confirm` - Create or amend the booking
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use appointment_cell::{appointment_routes, BookingCollaborators, BookingWizardService, InMemoryWizardCache};
//! use shared_config::AppConfig;
//! use std::sync::Arc;
//!
//! let config = AppConfig::from_env();
//! let collaborators = BookingCollaborators::http(&config, Arc::new(InMemoryWizardCache::new()));
//! let routes = appointment_routes(Arc::new(BookingWizardService::new(collaborators)));
//! ```

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

// Re-export commonly used types
pub use models::{
    AppointmentDetailsForm, AppointmentDraft, AppointmentError, AppointmentWindow, AvailabilityReport,
    Booking, BookingRef, BookingRequest, BookingType, LegType, LocationId, LocationIdentity,
    StepOutcome, SubAppointment, VideoLinkDetailsForm, WizardHandle, WizardState, WizardStep,
};

pub use services::{
    BookingCollaborators, BookingWizardService, InMemoryWizardCache, LocationIdentityResolver,
    RedisWizardCache, WizardCache,
};

pub use router::appointment_routes;
