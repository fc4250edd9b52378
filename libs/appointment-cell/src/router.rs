// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::booking::BookingWizardService;

pub fn appointment_routes(service: Arc<BookingWizardService>) -> Router {
    Router::new()
        // Entry points
        .route(
            "/prisoners/{offender_ref}/appointments/details",
            post(handlers::submit_appointment_details),
        )
        .route(
            "/prisoners/{offender_ref}/bookings/{booking_ref}/amend",
            post(handlers::start_amend),
        )
        // Later steps, addressed by wizard handle
        .route("/wizard/{handle}", get(handlers::get_wizard_state))
        .route(
            "/wizard/{handle}/video-link-details",
            post(handlers::submit_video_link_details),
        )
        .route("/wizard/{handle}/availability", get(handlers::check_availability))
        .route("/wizard/{handle}/confirm", post(handlers::confirm_booking))
        .with_state(service)
}
