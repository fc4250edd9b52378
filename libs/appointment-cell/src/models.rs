// libs/appointment-cell/src/models.rs
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Length of the PRE and POST legs either side of a video-link hearing.
pub const VIDEO_LINK_BUFFER_MINUTES: i64 = 15;

// ==============================================================================
// LOCATION IDENTITY
// ==============================================================================

/// The identifier spaces a physical location is known by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Legacy record-keeping system id
    Numeric,
    /// Location directory id
    Opaque,
    /// Short key used by the scheduling / video-link system
    Key,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LocationId {
    Numeric(i64),
    Opaque(Uuid),
    Key(String),
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationId::Numeric(id) => write!(f, "numeric:{}", id),
            LocationId::Opaque(id) => write!(f, "opaque:{}", id),
            LocationId::Key(key) => write!(f, "key:{}", key),
        }
    }
}

/// One physical location with all three of its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationIdentity {
    pub numeric_id: i64,
    pub opaque_id: Uuid,
    pub key: String,
    pub display_name: Option<String>,
}

// ==============================================================================
// BOOKINGS AND LEGS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    Simple,
    CourtVideoLink,
    ProbationVideoLink,
}

impl BookingType {
    pub fn is_video_link(&self) -> bool {
        matches!(self, BookingType::CourtVideoLink | BookingType::ProbationVideoLink)
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingType::Simple => write!(f, "SIMPLE"),
            BookingType::CourtVideoLink => write!(f, "COURT_VIDEO_LINK"),
            BookingType::ProbationVideoLink => write!(f, "PROBATION_VIDEO_LINK"),
        }
    }
}

impl FromStr for BookingType {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SIMPLE" => Ok(BookingType::Simple),
            "COURT_VIDEO_LINK" | "VLB" => Ok(BookingType::CourtVideoLink),
            "PROBATION_VIDEO_LINK" | "VLPM" => Ok(BookingType::ProbationVideoLink),
            other => Err(AppointmentError::ValidationError(format!("Unknown booking type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegType {
    Pre,
    Main,
    Post,
}

impl fmt::Display for LegType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegType::Pre => write!(f, "PRE"),
            LegType::Main => write!(f, "MAIN"),
            LegType::Post => write!(f, "POST"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingRef(pub i64);

impl fmt::Display for BookingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookingRef {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(BookingRef)
    }
}

/// A staff-entered time window at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentWindow {
    pub location: LocationId,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub comment: Option<String>,
}

impl AppointmentWindow {
    pub fn new(
        location: LocationId,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
        comment: Option<String>,
    ) -> Result<Self, AppointmentError> {
        if start_time >= end_time {
            return Err(AppointmentError::InvalidWindow(format!(
                "start {} is not before end {}",
                start_time, end_time
            )));
        }

        Ok(Self { location, start_time, end_time, comment })
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// One calendar entry of a booking. Never entered directly by staff.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubAppointment {
    pub leg_type: LegType,
    pub location_key: String,
    /// Date of this leg's own start, which for a PRE leg may precede the MAIN leg's date.
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl SubAppointment {
    pub fn spanning(
        leg_type: LegType,
        location_key: impl Into<String>,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    ) -> Self {
        Self {
            leg_type,
            location_key: location_key.into(),
            date: starts_at.date(),
            start_time: starts_at.time(),
            end_time: ends_at.time(),
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// An end time at or before the start time belongs to the following day.
    pub fn ends_at(&self) -> NaiveDateTime {
        let end = self.date.and_time(self.end_time);
        if self.end_time > self.start_time {
            end
        } else {
            end + Duration::days(1)
        }
    }

    pub fn duration(&self) -> Duration {
        self.ends_at() - self.starts_at()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoLinkDetails {
    Court {
        court_code: String,
        hearing_type_code: String,
        video_link_url: Option<String>,
    },
    Probation {
        probation_team_code: String,
        meeting_type_code: String,
        video_link_url: Option<String>,
    },
}

impl VideoLinkDetails {
    pub fn booking_type(&self) -> BookingType {
        match self {
            VideoLinkDetails::Court { .. } => BookingType::CourtVideoLink,
            VideoLinkDetails::Probation { .. } => BookingType::ProbationVideoLink,
        }
    }

    pub fn video_link_url(&self) -> Option<&str> {
        match self {
            VideoLinkDetails::Court { video_link_url, .. }
            | VideoLinkDetails::Probation { video_link_url, .. } => video_link_url.as_deref(),
        }
    }
}

/// A booking as held by the booking store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_ref: BookingRef,
    pub booking_type: BookingType,
    pub offender_ref: String,
    pub sub_appointments: Vec<SubAppointment>,
    pub recurrence: Option<RecurrenceSpec>,
    pub video_link: Option<VideoLinkDetails>,
    pub comment: Option<String>,
}

impl Booking {
    pub fn leg(&self, leg_type: LegType) -> Option<&SubAppointment> {
        self.sub_appointments.iter().find(|leg| leg.leg_type == leg_type)
    }
}

/// Complete desired end state of a booking, sent on both create and amend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub booking_type: BookingType,
    pub offender_ref: String,
    pub sub_appointments: Vec<SubAppointment>,
    pub recurrence: Option<RecurrenceSpec>,
    pub series_end_date: Option<NaiveDate>,
    pub video_link: Option<VideoLinkDetails>,
    pub comment: Option<String>,
}

/// Whether a booking already exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "booking_ref", rename_all = "snake_case")]
pub enum BookingLifecycle {
    New,
    Existing(BookingRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Create,
    Amend,
}

// ==============================================================================
// RECURRENCE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cadence {
    Daily,
    Weekdays,
    Weekly,
    Fortnightly,
    Monthly,
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Daily => write!(f, "DAILY"),
            Cadence::Weekdays => write!(f, "WEEKDAYS"),
            Cadence::Weekly => write!(f, "WEEKLY"),
            Cadence::Fortnightly => write!(f, "FORTNIGHTLY"),
            Cadence::Monthly => write!(f, "MONTHLY"),
        }
    }
}

impl FromStr for Cadence {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Cadence::Daily),
            "WEEKDAYS" => Ok(Cadence::Weekdays),
            "WEEKLY" => Ok(Cadence::Weekly),
            "FORTNIGHTLY" => Ok(Cadence::Fortnightly),
            "MONTHLY" => Ok(Cadence::Monthly),
            other => Err(AppointmentError::ValidationError(format!("Unknown repeat period: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSpec {
    pub cadence: Cadence,
    pub count: u32,
}

impl RecurrenceSpec {
    pub fn new(cadence: Cadence, count: u32) -> Result<Self, AppointmentError> {
        if count == 0 {
            return Err(AppointmentError::ValidationError(
                "Recurrence count must be 1 or more".to_string(),
            ));
        }
        Ok(Self { cadence, count })
    }

    pub fn is_repeating(&self) -> bool {
        self.count > 1
    }
}

// ==============================================================================
// WIZARD STATE
// ==============================================================================

/// Everything entered so far for one booking interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub offender_ref: String,
    pub booking_ref: Option<BookingRef>,
    pub booking_type: Option<BookingType>,
    pub window: Option<AppointmentWindow>,
    pub pre_location: Option<LocationId>,
    pub post_location: Option<LocationId>,
    pub recurrence: Option<RecurrenceSpec>,
    pub video_link: Option<VideoLinkDetails>,
}

impl AppointmentDraft {
    pub fn new(offender_ref: impl Into<String>) -> Self {
        Self {
            offender_ref: offender_ref.into(),
            booking_ref: None,
            booking_type: None,
            window: None,
            pre_location: None,
            post_location: None,
            recurrence: None,
            video_link: None,
        }
    }

    pub fn lifecycle(&self) -> BookingLifecycle {
        match self.booking_ref {
            Some(booking_ref) => BookingLifecycle::Existing(booking_ref),
            None => BookingLifecycle::New,
        }
    }

    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            pre: self.pre_location.clone(),
            post: self.post_location.clone(),
        }
    }
}

/// Optional legs to synthesize around a video-link window, each with its own location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeOptions {
    pub pre: Option<LocationId>,
    pub post: Option<LocationId>,
}

impl ComposeOptions {
    pub fn with_pre(mut self, location: LocationId) -> Self {
        self.pre = Some(location);
        self
    }

    pub fn with_post(mut self, location: LocationId) -> Self {
        self.post = Some(location);
        self
    }
}

/// Display-ready results of lookups made while the wizard was being filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChoices {
    pub main_location: Option<LocationIdentity>,
    pub pre_location: Option<LocationIdentity>,
    pub post_location: Option<LocationIdentity>,
    pub series_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    pub draft: AppointmentDraft,
    /// Raw values of the last submitted form, for re-rendering after an error.
    pub form_snapshot: Value,
    pub resolved_choices: Option<ResolvedChoices>,
}

impl WizardState {
    pub fn new(draft: AppointmentDraft) -> Self {
        Self {
            draft,
            form_snapshot: Value::Null,
            resolved_choices: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WizardHandle(pub Uuid);

impl WizardHandle {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WizardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WizardHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(WizardHandle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    AppointmentDetails,
    VideoLinkDetails,
    CheckAnswers,
}

// ==============================================================================
// FORMS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppointmentDetailsForm {
    pub booking_type: Option<String>,
    pub location: Option<String>,
    /// DD/MM/YYYY
    pub date: Option<String>,
    /// HH:MM
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub comment: Option<String>,
    pub pre_required: Option<bool>,
    pub pre_location: Option<String>,
    pub post_required: Option<bool>,
    pub post_location: Option<String>,
    pub repeat: Option<bool>,
    pub repeat_cadence: Option<String>,
    pub repeat_count: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoLinkDetailsForm {
    pub court_code: Option<String>,
    pub hearing_type_code: Option<String>,
    pub probation_team_code: Option<String>,
    pub meeting_type_code: Option<String>,
    pub video_link_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// `None` for a message about the whole submission.
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    pub fn form(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// An entry from the scheduling service, located by legacy numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub subject_id: String,
    pub location_id: Option<i64>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub event_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingEvent {
    #[serde(flatten)]
    pub event: ScheduledEvent,
    /// `None` when the event's location could not be resolved.
    pub location_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clash {
    pub leg_type: LegType,
    pub event: ExistingEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationEvents {
    pub location_key: String,
    pub events: Vec<ExistingEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub legs: Vec<SubAppointment>,
    pub offender_events: Vec<ExistingEvent>,
    pub location_events: Vec<LocationEvents>,
    pub clashes: Vec<Clash>,
}

impl AvailabilityReport {
    pub fn is_available(&self) -> bool {
        self.clashes.is_empty()
    }
}

// ==============================================================================
// STEP OUTCOMES
// ==============================================================================

/// What the web layer should do after a wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Advance {
        handle: WizardHandle,
        next: WizardStep,
    },
    Rerender {
        handle: Option<WizardHandle>,
        errors: Vec<FieldError>,
    },
    Availability {
        handle: WizardHandle,
        report: AvailabilityReport,
    },
    Complete {
        booking_ref: BookingRef,
        action: BookingAction,
    },
    RedirectToStart,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid appointment window: {0}")]
    InvalidWindow(String),

    #[error("Location {0} is not mapped")]
    LocationNotMapped(String),

    #[error("Location {identifier} for the {leg} leg is not mapped")]
    LegLocationNotMapped { leg: LegType, identifier: String },

    #[error("Booking {0} not found")]
    BookingNotFound(BookingRef),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Wizard store error: {0}")]
    WizardStoreError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}
