// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{
    AppointmentDraft, AppointmentError, Booking, BookingAction, BookingLifecycle, BookingRef,
    BookingRequest, BookingType, LegType, SubAppointment,
};
use crate::services::clients::BookingStore;
use crate::services::recurrence;

/// Create a new booking, or amend the one the draft was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingDecision {
    Create,
    Amend {
        target_ref: BookingRef,
        /// The booking as currently stored, fetched at decision time.
        existing: Booking,
    },
}

impl BookingDecision {
    pub fn action(&self) -> BookingAction {
        match self {
            BookingDecision::Create => BookingAction::Create,
            BookingDecision::Amend { .. } => BookingAction::Amend,
        }
    }
}

pub struct BookingLifecycleDecider {
    store: Arc<dyn BookingStore>,
}

impl BookingLifecycleDecider {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Makes at most one store call (the re-fetch of an existing booking). Never creates or amends.
    pub async fn decide(&self, draft: &AppointmentDraft) -> Result<BookingDecision, AppointmentError> {
        match draft.lifecycle() {
            BookingLifecycle::New => {
                debug!("Draft for {} has no booking reference, creating", draft.offender_ref);
                Ok(BookingDecision::Create)
            }
            BookingLifecycle::Existing(target_ref) => {
                let existing = self
                    .store
                    .get(target_ref)
                    .await?
                    .ok_or(AppointmentError::BookingNotFound(target_ref))?;

                info!(
                    "Draft for {} amends booking {} ({} stored legs)",
                    draft.offender_ref,
                    target_ref,
                    existing.sub_appointments.len()
                );

                Ok(BookingDecision::Amend { target_ref, existing })
            }
        }
    }
}

/// Builds the complete end state to send for `decision`.
pub fn build_request(
    decision: &BookingDecision,
    draft: &AppointmentDraft,
    legs: Vec<SubAppointment>,
) -> Result<BookingRequest, AppointmentError> {
    let booking_type = draft
        .booking_type
        .ok_or_else(|| AppointmentError::ValidationError("Appointment type has not been selected".to_string()))?;

    let window = draft
        .window
        .as_ref()
        .ok_or_else(|| AppointmentError::ValidationError("Appointment time has not been entered".to_string()))?;

    let video_link = match (booking_type.is_video_link(), draft.video_link.clone()) {
        (false, _) => None,
        (true, Some(details)) if details.booking_type() == booking_type => Some(details),
        (true, _) => {
            return Err(AppointmentError::ValidationError(format!(
                "{} bookings need matching court or probation details",
                booking_type
            )))
        }
    };

    let recurrence = match booking_type {
        BookingType::Simple => draft.recurrence.filter(|r| r.is_repeating()),
        _ => None,
    };

    let series_end_date = match (recurrence, legs.iter().find(|leg| leg.leg_type == LegType::Main)) {
        (Some(spec), Some(main)) => Some(recurrence::series_end_date(main.date, &spec)),
        _ => None,
    };

    if let BookingDecision::Amend { target_ref, existing } = decision {
        if existing.booking_type != booking_type {
            warn!(
                "Attempt to change booking {} from {} to {}",
                target_ref, existing.booking_type, booking_type
            );
            return Err(AppointmentError::ValidationError(
                "The type of an existing booking cannot be changed".to_string(),
            ));
        }

        if existing.offender_ref != draft.offender_ref {
            warn!("Booking {} does not belong to {}", target_ref, draft.offender_ref);
            return Err(AppointmentError::BookingNotFound(*target_ref));
        }

        let changed = changed_legs(&existing.sub_appointments, &legs);
        debug!("Amending booking {}: changed legs {:?}", target_ref, changed);
    }

    Ok(BookingRequest {
        booking_type,
        offender_ref: draft.offender_ref.clone(),
        sub_appointments: legs,
        recurrence,
        series_end_date,
        video_link,
        comment: window.comment.clone(),
    })
}

/// Leg types that were added, removed, or moved relative to `original`.
pub fn changed_legs(original: &[SubAppointment], updated: &[SubAppointment]) -> Vec<LegType> {
    [LegType::Pre, LegType::Main, LegType::Post]
        .into_iter()
        .filter(|leg_type| {
            let before = original.iter().find(|leg| leg.leg_type == *leg_type);
            let after = updated.iter().find(|leg| leg.leg_type == *leg_type);
            before != after
        })
        .collect()
}
