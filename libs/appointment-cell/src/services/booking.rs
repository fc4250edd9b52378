// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{
    AppointmentDetailsForm, AppointmentDraft, AppointmentError, AppointmentWindow, BookingRef,
    FieldError, LegType, LocationId, LocationIdentity, ResolvedChoices, StepOutcome, SubAppointment,
    VideoLinkDetailsForm, WizardHandle, WizardState, WizardStep,
};
use crate::services::clients::{
    BookingStore, HttpBookingStore, HttpLocationMappingApi, HttpLocationsApi, HttpScheduleApi,
    LocationMappingApi, LocationsApi, ScheduleApi,
};
use crate::services::composer::AppointmentWindowComposer;
use crate::services::conflict::AvailabilityService;
use crate::services::lifecycle::{build_request, BookingDecision, BookingLifecycleDecider};
use crate::services::location::LocationIdentityResolver;
use crate::services::validation::{
    validate_appointment_details, validate_offender_ref, validate_video_link_details, ValidAppointmentDetails,
};
use crate::services::wizard::{WizardCache, WizardStateCoordinator};
use crate::services::recurrence;

/// Source of the prison-local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Everything outside this cell that a booking interaction talks to.
#[derive(Clone)]
pub struct BookingCollaborators {
    pub mapping: Arc<dyn LocationMappingApi>,
    pub locations: Arc<dyn LocationsApi>,
    pub store: Arc<dyn BookingStore>,
    pub schedule: Arc<dyn ScheduleApi>,
    pub wizard_cache: Arc<dyn WizardCache>,
}

impl BookingCollaborators {
    pub fn http(config: &AppConfig, wizard_cache: Arc<dyn WizardCache>) -> Self {
        Self {
            mapping: Arc::new(HttpLocationMappingApi::new(config)),
            locations: Arc::new(HttpLocationsApi::new(config)),
            store: Arc::new(HttpBookingStore::new(config)),
            schedule: Arc::new(HttpScheduleApi::new(config)),
            wizard_cache,
        }
    }
}

/// One entry point per step of the booking wizard.
///
/// Step failures the user can act on come back as [`StepOutcome::Rerender`]; an `Err` means the
/// wizard state itself could not be read or written.
pub struct BookingWizardService {
    resolver: Arc<LocationIdentityResolver>,
    composer: AppointmentWindowComposer,
    decider: BookingLifecycleDecider,
    availability: AvailabilityService,
    wizard: WizardStateCoordinator,
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
}

impl BookingWizardService {
    pub fn new(collaborators: BookingCollaborators) -> Self {
        Self::with_clock(collaborators, Arc::new(SystemClock))
    }

    pub fn with_clock(collaborators: BookingCollaborators, clock: Arc<dyn Clock>) -> Self {
        let resolver = Arc::new(LocationIdentityResolver::new(
            collaborators.mapping,
            collaborators.locations,
        ));

        Self {
            composer: AppointmentWindowComposer::new(Arc::clone(&resolver)),
            decider: BookingLifecycleDecider::new(Arc::clone(&collaborators.store)),
            availability: AvailabilityService::new(collaborators.schedule, Arc::clone(&resolver)),
            wizard: WizardStateCoordinator::new(collaborators.wizard_cache),
            store: collaborators.store,
            resolver,
            clock,
        }
    }

    // ==============================================================================
    // STEPS
    // ==============================================================================

    /// Loads a stored booking into a fresh wizard so it can be amended.
    pub async fn start_amend(&self, offender_ref: &str, booking_ref: BookingRef) -> Result<StepOutcome, AppointmentError> {
        let booking = self
            .store
            .get(booking_ref)
            .await?
            .filter(|booking| booking.offender_ref == offender_ref)
            .ok_or(AppointmentError::BookingNotFound(booking_ref))?;

        let main = booking.leg(LegType::Main).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Booking {} has no main appointment", booking_ref))
        })?;

        let identities = try_join_all(
            booking
                .sub_appointments
                .iter()
                .map(|leg| self.resolver.from_key(&leg.location_key)),
        )
        .await?;

        let identity_for = |leg_type: LegType| {
            booking
                .sub_appointments
                .iter()
                .zip(&identities)
                .find(|(leg, _)| leg.leg_type == leg_type)
                .map(|(_, identity)| identity.clone())
        };

        let main_identity = identity_for(LegType::Main);
        let pre_identity = identity_for(LegType::Pre);
        let post_identity = identity_for(LegType::Post);

        let location = main_identity
            .as_ref()
            .map(|identity| LocationId::Numeric(identity.numeric_id))
            .ok_or_else(|| AppointmentError::LocationNotMapped(main.location_key.clone()))?;

        let mut draft = AppointmentDraft::new(offender_ref);
        draft.booking_ref = Some(booking_ref);
        draft.booking_type = Some(booking.booking_type);
        draft.window = Some(AppointmentWindow::new(
            location,
            main.starts_at(),
            main.ends_at(),
            booking.comment.clone(),
        )?);
        draft.pre_location = pre_identity.as_ref().map(|identity| LocationId::Numeric(identity.numeric_id));
        draft.post_location = post_identity.as_ref().map(|identity| LocationId::Numeric(identity.numeric_id));
        draft.recurrence = booking.recurrence;
        draft.video_link = booking.video_link.clone();

        let mut state = WizardState::new(draft);
        state.form_snapshot = serde_json::to_value(form_from_draft(&state.draft))?;
        state.resolved_choices = Some(ResolvedChoices {
            main_location: main_identity,
            pre_location: pre_identity,
            post_location: post_identity,
            series_end_date: booking.recurrence.map(|spec| recurrence::series_end_date(main.date, &spec)),
        });

        let handle = self.wizard.save(&state, None).await?;
        info!("Started amending booking {} for {} ({})", booking_ref, offender_ref, handle);

        Ok(StepOutcome::Advance {
            handle,
            next: WizardStep::AppointmentDetails,
        })
    }

    /// First step: what, where and when.
    pub async fn submit_appointment_details(
        &self,
        handle: Option<&str>,
        offender_ref: &str,
        form: AppointmentDetailsForm,
    ) -> Result<StepOutcome, AppointmentError> {
        let (handle, mut state) = match handle {
            Some(raw) => match self.wizard.load_raw(raw).await? {
                Some((handle, state)) if state.draft.offender_ref == offender_ref => (Some(handle), state),
                Some((handle, _)) => {
                    warn!("Wizard {} belongs to a different prisoner, restarting", handle);
                    return Ok(StepOutcome::RedirectToStart);
                }
                None => return Ok(StepOutcome::RedirectToStart),
            },
            None => (None, WizardState::new(AppointmentDraft::new(offender_ref))),
        };

        state.form_snapshot = serde_json::to_value(&form)?;

        if !validate_offender_ref(offender_ref) {
            return self
                .rerender(&state, handle, vec![FieldError::form("Enter a valid prison number")])
                .await;
        }

        let details = match validate_appointment_details(&form, self.clock.now()) {
            Ok(details) => details,
            Err(errors) => return self.rerender(&state, handle, errors).await,
        };

        let choices = match self.resolve_choices(&details).await {
            Ok(choices) => choices,
            Err(e) => {
                let errors = self.step_errors(e)?;
                return self.rerender(&state, handle, errors).await;
            }
        };

        apply_details(&mut state.draft, details);
        state.resolved_choices = Some(choices);

        let next = match state.draft.booking_type {
            Some(booking_type) if booking_type.is_video_link() => WizardStep::VideoLinkDetails,
            _ => WizardStep::CheckAnswers,
        };

        let handle = self.wizard.save(&state, handle).await?;
        debug!("Appointment details accepted for {} ({})", offender_ref, handle);

        Ok(StepOutcome::Advance { handle, next })
    }

    /// Second step, video-link bookings only: court or probation details.
    pub async fn submit_video_link_details(
        &self,
        handle: &str,
        form: VideoLinkDetailsForm,
    ) -> Result<StepOutcome, AppointmentError> {
        let Some((handle, mut state)) = self.wizard.load_raw(handle).await? else {
            return Ok(StepOutcome::RedirectToStart);
        };

        let Some(booking_type) = state.draft.booking_type else {
            return Ok(StepOutcome::RedirectToStart);
        };

        state.form_snapshot = serde_json::to_value(&form)?;

        match validate_video_link_details(&form, booking_type) {
            Ok(details) => {
                state.draft.video_link = Some(details);
                let handle = self.wizard.save(&state, Some(handle)).await?;
                Ok(StepOutcome::Advance {
                    handle,
                    next: WizardStep::CheckAnswers,
                })
            }
            Err(errors) => self.rerender(&state, Some(handle), errors).await,
        }
    }

    /// What else is booked for the prisoner and the rooms the booking would use.
    pub async fn check_availability(&self, handle: &str) -> Result<StepOutcome, AppointmentError> {
        let Some((handle, state)) = self.wizard.load_raw(handle).await? else {
            return Ok(StepOutcome::RedirectToStart);
        };

        let (Some(window), Some(booking_type)) = (state.draft.window.as_ref(), state.draft.booking_type) else {
            return Ok(StepOutcome::RedirectToStart);
        };

        let result = async {
            let legs = self
                .composer
                .compose(window, booking_type, &state.draft.compose_options())
                .await?;
            let report = self
                .availability
                .check(&state.draft.offender_ref, &legs, state.draft.lifecycle())
                .await?;
            Ok::<_, AppointmentError>(report)
        }
        .await;

        match result {
            Ok(report) => Ok(StepOutcome::Availability { handle, report }),
            Err(e) => Ok(StepOutcome::Rerender {
                handle: Some(handle),
                errors: self.step_errors(e)?,
            }),
        }
    }

    /// Creates or amends the booking, then discards the wizard state.
    pub async fn confirm(&self, handle: &str) -> Result<StepOutcome, AppointmentError> {
        let Some((handle, state)) = self.wizard.load_raw(handle).await? else {
            return Ok(StepOutcome::RedirectToStart);
        };

        let (Some(window), Some(booking_type)) = (state.draft.window.as_ref(), state.draft.booking_type) else {
            return Ok(StepOutcome::RedirectToStart);
        };

        let result = async {
            let legs = self
                .composer
                .compose(window, booking_type, &state.draft.compose_options())
                .await?;
            let decision = self.decider.decide(&state.draft).await?;
            let request = build_request(&decision, &state.draft, legs)?;

            let booking_ref = match &decision {
                BookingDecision::Create => self.store.create(&request).await?,
                BookingDecision::Amend { target_ref, .. } => {
                    self.store.amend(*target_ref, &request).await?;
                    *target_ref
                }
            };

            Ok::<_, AppointmentError>((booking_ref, decision.action()))
        }
        .await;

        match result {
            Ok((booking_ref, action)) => {
                self.wizard.discard(handle).await?;
                info!("Booking {} confirmed ({:?}) for {}", booking_ref, action, state.draft.offender_ref);
                Ok(StepOutcome::Complete { booking_ref, action })
            }
            Err(e) => {
                let errors = self.step_errors(e)?;
                self.rerender(&state, Some(handle), errors).await
            }
        }
    }

    /// Current wizard state, for navigating back to an earlier step.
    pub async fn get_state(&self, handle: &str) -> Result<Option<WizardState>, AppointmentError> {
        Ok(self.wizard.load_raw(handle).await?.map(|(_, state)| state))
    }

    // ==============================================================================
    // HELPERS
    // ==============================================================================

    async fn resolve_choices(&self, details: &ValidAppointmentDetails) -> Result<ResolvedChoices, AppointmentError> {
        let main_location = self
            .composer
            .resolve_leg_location(LegType::Main, &details.window.location)
            .await?;

        let (pre_location, post_location) = futures::try_join!(
            self.optional_location(LegType::Pre, details.pre_location.as_ref()),
            self.optional_location(LegType::Post, details.post_location.as_ref()),
        )?;

        Ok(ResolvedChoices {
            main_location: Some(main_location),
            pre_location,
            post_location,
            series_end_date: details.series_end_date,
        })
    }

    async fn optional_location(
        &self,
        leg_type: LegType,
        location: Option<&LocationId>,
    ) -> Result<Option<LocationIdentity>, AppointmentError> {
        match location {
            Some(location) => Ok(Some(self.composer.resolve_leg_location(leg_type, location).await?)),
            None => Ok(None),
        }
    }

    async fn rerender(
        &self,
        state: &WizardState,
        handle: Option<WizardHandle>,
        errors: Vec<FieldError>,
    ) -> Result<StepOutcome, AppointmentError> {
        let handle = self.wizard.save(state, handle).await?;
        Ok(StepOutcome::Rerender {
            handle: Some(handle),
            errors,
        })
    }

    /// Turns a failed step into messages for the user. Wizard store failures are passed back up.
    fn step_errors(&self, error: AppointmentError) -> Result<Vec<FieldError>, AppointmentError> {
        warn!("Wizard step failed: {}", error);

        let message = match error {
            AppointmentError::WizardStoreError(_)
            | AppointmentError::RedisError(_)
            | AppointmentError::SerializationError(_) => return Err(error),
            AppointmentError::LegLocationNotMapped { leg: LegType::Pre, .. } => {
                return Ok(vec![FieldError::field(
                    "pre_location",
                    "The location for before the hearing cannot be used, select another",
                )])
            }
            AppointmentError::LegLocationNotMapped { leg: LegType::Post, .. } => {
                return Ok(vec![FieldError::field(
                    "post_location",
                    "The location for after the hearing cannot be used, select another",
                )])
            }
            AppointmentError::LegLocationNotMapped { .. } | AppointmentError::LocationNotMapped(_) => {
                "The appointment could not be booked at the selected location".to_string()
            }
            AppointmentError::ValidationError(message) | AppointmentError::InvalidWindow(message) => message,
            AppointmentError::BookingNotFound(_) => "The booking could not be found, it may have been cancelled".to_string(),
            AppointmentError::ExternalServiceError(_) => {
                "There was a problem contacting the booking service, try again".to_string()
            }
        };

        Ok(vec![FieldError::form(message)])
    }
}

fn apply_details(draft: &mut AppointmentDraft, details: ValidAppointmentDetails) {
    if draft
        .video_link
        .as_ref()
        .is_some_and(|video_link| video_link.booking_type() != details.booking_type)
    {
        draft.video_link = None;
    }

    draft.booking_type = Some(details.booking_type);
    draft.window = Some(details.window);
    draft.pre_location = details.pre_location;
    draft.post_location = details.post_location;
    draft.recurrence = details.recurrence;
}

fn location_field(location: &LocationId) -> String {
    match location {
        LocationId::Numeric(id) => id.to_string(),
        LocationId::Opaque(id) => id.to_string(),
        LocationId::Key(key) => key.clone(),
    }
}

/// The step 1 form as it would have been submitted to produce `draft`.
pub fn form_from_draft(draft: &AppointmentDraft) -> AppointmentDetailsForm {
    let window = draft.window.as_ref();

    AppointmentDetailsForm {
        booking_type: draft.booking_type.map(|t| t.to_string()),
        location: window.map(|w| location_field(&w.location)),
        date: window.map(|w| w.start_time.format("%d/%m/%Y").to_string()),
        start_time: window.map(|w| w.start_time.format("%H:%M").to_string()),
        end_time: window.map(|w| w.end_time.format("%H:%M").to_string()),
        comment: window.and_then(|w| w.comment.clone()),
        pre_required: Some(draft.pre_location.is_some()),
        pre_location: draft.pre_location.as_ref().map(location_field),
        post_required: Some(draft.post_location.is_some()),
        post_location: draft.post_location.as_ref().map(location_field),
        repeat: Some(draft.recurrence.is_some_and(|r| r.is_repeating())),
        repeat_cadence: draft.recurrence.map(|r| r.cadence.to_string()),
        repeat_count: draft.recurrence.map(|r| r.count.to_string()),
    }
}
