// libs/appointment-cell/src/services/validation.rs
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    AppointmentDetailsForm, AppointmentWindow, BookingType, Cadence, FieldError, LocationId,
    RecurrenceSpec, VideoLinkDetails, VideoLinkDetailsForm,
};
use crate::services::recurrence;

pub const MAX_COMMENT_LENGTH: usize = 3600;
pub const MAX_VIDEO_LINK_URL_LENGTH: usize = 120;

/// Step 1 input once every field has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidAppointmentDetails {
    pub booking_type: BookingType,
    pub window: AppointmentWindow,
    pub pre_location: Option<LocationId>,
    pub post_location: Option<LocationId>,
    pub recurrence: Option<RecurrenceSpec>,
    pub series_end_date: Option<NaiveDate>,
}

fn offender_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z][0-9]{4}[A-Z]{2}$").expect("offender reference pattern"))
}

pub fn validate_offender_ref(offender_ref: &str) -> bool {
    offender_ref_pattern().is_match(offender_ref)
}

/// Numeric strings are legacy ids, UUIDs are directory ids, anything else is a key.
pub fn parse_location(raw: &str) -> LocationId {
    let raw = raw.trim();
    if let Ok(numeric_id) = raw.parse::<i64>() {
        LocationId::Numeric(numeric_id)
    } else if let Ok(opaque_id) = Uuid::parse_str(raw) {
        LocationId::Opaque(opaque_id)
    } else {
        LocationId::Key(raw.to_string())
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M").ok()
}

pub fn validate_appointment_details(
    form: &AppointmentDetailsForm,
    now: NaiveDateTime,
) -> Result<ValidAppointmentDetails, Vec<FieldError>> {
    let mut errors = Vec::new();

    let booking_type = match present(&form.booking_type) {
        None => {
            errors.push(FieldError::field("booking_type", "Select the appointment type"));
            None
        }
        Some(raw) => match raw.parse::<BookingType>() {
            Ok(booking_type) => Some(booking_type),
            Err(_) => {
                errors.push(FieldError::field("booking_type", "Select the appointment type"));
                None
            }
        },
    };

    let location = present(&form.location).map(parse_location);
    if location.is_none() {
        errors.push(FieldError::field("location", "Select the location"));
    }

    let date = match present(&form.date) {
        None => {
            errors.push(FieldError::field("date", "Enter the date of the appointment"));
            None
        }
        Some(raw) => match parse_date(raw) {
            None => {
                errors.push(FieldError::field("date", "Enter a real date"));
                None
            }
            Some(date) if date < now.date() => {
                errors.push(FieldError::field("date", "Enter a date that is today or in the future"));
                None
            }
            Some(date) => Some(date),
        },
    };

    let start_time = match present(&form.start_time) {
        None => {
            errors.push(FieldError::field("start_time", "Enter a start time"));
            None
        }
        Some(raw) => match parse_time(raw) {
            None => {
                errors.push(FieldError::field("start_time", "Enter a real start time"));
                None
            }
            Some(time) if date == Some(now.date()) && time <= now.time() => {
                errors.push(FieldError::field("start_time", "Enter a start time that is in the future"));
                None
            }
            Some(time) => Some(time),
        },
    };

    let end_time = match present(&form.end_time) {
        None => {
            errors.push(FieldError::field("end_time", "Enter an end time"));
            None
        }
        Some(raw) => match parse_time(raw) {
            None => {
                errors.push(FieldError::field("end_time", "Enter a real end time"));
                None
            }
            Some(time) if start_time.is_some_and(|start| time <= start) => {
                errors.push(FieldError::field("end_time", "Enter an end time that is after the start time"));
                None
            }
            Some(time) => Some(time),
        },
    };

    let comment = present(&form.comment).map(str::to_string);
    if comment.as_ref().is_some_and(|c| c.chars().count() > MAX_COMMENT_LENGTH) {
        errors.push(FieldError::field(
            "comment",
            format!("Enter a comment of {} characters or less", MAX_COMMENT_LENGTH),
        ));
    }

    let is_video_link = booking_type.is_some_and(|t| t.is_video_link());

    let pre_location = leg_location(
        is_video_link,
        form.pre_required,
        &form.pre_location,
        "pre_location",
        "Select the location for before the hearing",
        &mut errors,
    );
    let post_location = leg_location(
        is_video_link,
        form.post_required,
        &form.post_location,
        "post_location",
        "Select the location for after the hearing",
        &mut errors,
    );

    let repeat = if form.repeat == Some(true) {
        if is_video_link {
            errors.push(FieldError::field("repeat", "A video link appointment cannot repeat"));
            None
        } else {
            validate_repeat(form, date, &mut errors)
        }
    } else {
        None
    };

    if !errors.is_empty() {
        debug!("Appointment details rejected with {} errors", errors.len());
        return Err(errors);
    }

    match (booking_type, location, date, start_time, end_time) {
        (Some(booking_type), Some(location), Some(date), Some(start), Some(end)) => {
            let window = AppointmentWindow::new(location, date.and_time(start), date.and_time(end), comment)
                .map_err(|e| vec![FieldError::form(e.to_string())])?;

            Ok(ValidAppointmentDetails {
                booking_type,
                window,
                pre_location,
                post_location,
                series_end_date: repeat.map(|spec| recurrence::series_end_date(date, &spec)),
                recurrence: repeat,
            })
        }
        _ => Err(vec![FieldError::form("Check the appointment details and try again")]),
    }
}

fn leg_location(
    is_video_link: bool,
    required: Option<bool>,
    raw: &Option<String>,
    field: &str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<LocationId> {
    if !is_video_link || required != Some(true) {
        return None;
    }

    match present(raw) {
        Some(raw) => Some(parse_location(raw)),
        None => {
            errors.push(FieldError::field(field, message));
            None
        }
    }
}

fn validate_repeat(
    form: &AppointmentDetailsForm,
    date: Option<NaiveDate>,
    errors: &mut Vec<FieldError>,
) -> Option<RecurrenceSpec> {
    let cadence = present(&form.repeat_cadence).and_then(|raw| raw.parse::<Cadence>().ok());
    if cadence.is_none() {
        errors.push(FieldError::field("repeat_cadence", "Select how often the appointment repeats"));
    }

    let count = match present(&form.repeat_count) {
        None => {
            errors.push(FieldError::field("repeat_count", "Enter how many times the appointment repeats"));
            None
        }
        Some(raw) => match raw.parse::<u32>() {
            Ok(count) if count >= 1 => Some(count),
            _ => {
                errors.push(FieldError::field("repeat_count", "Enter a number of occurrences that is 1 or more"));
                None
            }
        },
    };

    let spec = RecurrenceSpec::new(cadence?, count?).ok()?;

    let too_long = match date {
        Some(date) => recurrence::exceeds_max_series_length(date, &spec),
        None => spec.count > recurrence::max_occurrences(spec.cadence),
    };

    if too_long {
        errors.push(FieldError::field(
            "repeat_count",
            "The last appointment in the series must be within a year of the first",
        ));
        return None;
    }

    Some(spec)
}

pub fn validate_video_link_details(
    form: &VideoLinkDetailsForm,
    booking_type: BookingType,
) -> Result<VideoLinkDetails, Vec<FieldError>> {
    let mut errors = Vec::new();

    let video_link_url = present(&form.video_link_url).map(str::to_string);
    if video_link_url
        .as_ref()
        .is_some_and(|url| url.chars().count() > MAX_VIDEO_LINK_URL_LENGTH)
    {
        errors.push(FieldError::field(
            "video_link_url",
            format!("Enter a video link of {} characters or less", MAX_VIDEO_LINK_URL_LENGTH),
        ));
    }

    let required = |value: &Option<String>, field: &str, message: &str, errors: &mut Vec<FieldError>| {
        let value = present(value).map(str::to_string);
        if value.is_none() {
            errors.push(FieldError::field(field, message));
        }
        value
    };

    let details = match booking_type {
        BookingType::Simple => {
            errors.push(FieldError::form("This appointment type does not take video link details"));
            None
        }
        BookingType::CourtVideoLink => {
            let court_code = required(&form.court_code, "court_code", "Select the court", &mut errors);
            let hearing_type_code = required(
                &form.hearing_type_code,
                "hearing_type_code",
                "Select the type of hearing",
                &mut errors,
            );
            court_code.zip(hearing_type_code).map(|(court_code, hearing_type_code)| {
                VideoLinkDetails::Court {
                    court_code,
                    hearing_type_code,
                    video_link_url: video_link_url.clone(),
                }
            })
        }
        BookingType::ProbationVideoLink => {
            let probation_team_code = required(
                &form.probation_team_code,
                "probation_team_code",
                "Select the probation team",
                &mut errors,
            );
            let meeting_type_code = required(
                &form.meeting_type_code,
                "meeting_type_code",
                "Select the type of meeting",
                &mut errors,
            );
            probation_team_code.zip(meeting_type_code).map(|(probation_team_code, meeting_type_code)| {
                VideoLinkDetails::Probation {
                    probation_team_code,
                    meeting_type_code,
                    video_link_url: video_link_url.clone(),
                }
            })
        }
    };

    match details {
        Some(details) if errors.is_empty() => Ok(details),
        _ => Err(errors),
    }
}
