// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use shared_models::error::AppError;

use crate::models::{
    AppointmentDetailsForm, AppointmentError, BookingRef, StepOutcome, VideoLinkDetailsForm, WizardState,
};
use crate::services::booking::BookingWizardService;

// ==============================================================================
// REQUEST BODIES
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AppointmentDetailsRequest {
    /// Present when the step is resubmitted or the booking is being amended.
    pub handle: Option<String>,
    #[serde(flatten)]
    pub form: AppointmentDetailsForm,
}

fn to_app_error(error: AppointmentError) -> AppError {
    match error {
        AppointmentError::BookingNotFound(booking_ref) => {
            AppError::NotFound(format!("Booking {} not found", booking_ref))
        }
        AppointmentError::ValidationError(msg) | AppointmentError::InvalidWindow(msg) => {
            AppError::ValidationError(msg)
        }
        AppointmentError::LocationNotMapped(_) | AppointmentError::LegLocationNotMapped { .. } => {
            AppError::BadRequest(error.to_string())
        }
        AppointmentError::ExternalServiceError(msg) => AppError::ExternalService(msg),
        AppointmentError::WizardStoreError(_) | AppointmentError::RedisError(_) => {
            AppError::ExternalService(error.to_string())
        }
        AppointmentError::SerializationError(e) => AppError::Internal(e.to_string()),
    }
}

// ==============================================================================
// WIZARD STEP HANDLERS
// ==============================================================================

pub async fn submit_appointment_details(
    State(service): State<Arc<BookingWizardService>>,
    Path(offender_ref): Path<String>,
    Json(request): Json<AppointmentDetailsRequest>,
) -> Result<Json<StepOutcome>, AppError> {
    let outcome = service
        .submit_appointment_details(request.handle.as_deref(), &offender_ref, request.form)
        .await
        .map_err(to_app_error)?;

    Ok(Json(outcome))
}

pub async fn start_amend(
    State(service): State<Arc<BookingWizardService>>,
    Path((offender_ref, booking_ref)): Path<(String, i64)>,
) -> Result<Json<StepOutcome>, AppError> {
    let outcome = service
        .start_amend(&offender_ref, BookingRef(booking_ref))
        .await
        .map_err(to_app_error)?;

    Ok(Json(outcome))
}

pub async fn submit_video_link_details(
    State(service): State<Arc<BookingWizardService>>,
    Path(handle): Path<String>,
    Json(form): Json<VideoLinkDetailsForm>,
) -> Result<Json<StepOutcome>, AppError> {
    let outcome = service
        .submit_video_link_details(&handle, form)
        .await
        .map_err(to_app_error)?;

    Ok(Json(outcome))
}

pub async fn check_availability(
    State(service): State<Arc<BookingWizardService>>,
    Path(handle): Path<String>,
) -> Result<Json<StepOutcome>, AppError> {
    let outcome = service.check_availability(&handle).await.map_err(to_app_error)?;
    Ok(Json(outcome))
}

pub async fn confirm_booking(
    State(service): State<Arc<BookingWizardService>>,
    Path(handle): Path<String>,
) -> Result<Json<StepOutcome>, AppError> {
    let outcome = service.confirm(&handle).await.map_err(to_app_error)?;
    Ok(Json(outcome))
}

pub async fn get_wizard_state(
    State(service): State<Arc<BookingWizardService>>,
    Path(handle): Path<String>,
) -> Result<Json<WizardState>, AppError> {
    service
        .get_state(&handle)
        .await
        .map_err(to_app_error)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Wizard state not found".to_string()))
}
