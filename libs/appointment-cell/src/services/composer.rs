// libs/appointment-cell/src/services/composer.rs
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::models::{
    AppointmentError, AppointmentWindow, BookingType, ComposeOptions, LegType, LocationId,
    LocationIdentity, SubAppointment, VIDEO_LINK_BUFFER_MINUTES,
};
use crate::services::location::LocationIdentityResolver;

/// Turns one staff-entered window into the legs a booking is made of.
pub struct AppointmentWindowComposer {
    resolver: Arc<LocationIdentityResolver>,
}

impl AppointmentWindowComposer {
    pub fn new(resolver: Arc<LocationIdentityResolver>) -> Self {
        Self { resolver }
    }

    /// Legs come back ordered PRE, MAIN, POST with absent legs left out.
    pub async fn compose(
        &self,
        window: &AppointmentWindow,
        booking_type: BookingType,
        options: &ComposeOptions,
    ) -> Result<Vec<SubAppointment>, AppointmentError> {
        if window.start_time >= window.end_time {
            return Err(AppointmentError::InvalidWindow(format!(
                "start {} is not before end {}",
                window.start_time, window.end_time
            )));
        }

        let main_location = self.resolve_leg_location(LegType::Main, &window.location).await?;
        let main = SubAppointment::spanning(LegType::Main, main_location.key, window.start_time, window.end_time);

        if !booking_type.is_video_link() {
            if options.pre.is_some() || options.post.is_some() {
                debug!("Ignoring pre/post legs requested for a {} booking", booking_type);
            }
            return Ok(vec![main]);
        }

        let buffer = Duration::minutes(VIDEO_LINK_BUFFER_MINUTES);
        let (pre, post) = futures::try_join!(
            self.optional_leg(LegType::Pre, options.pre.as_ref(), window.start_time - buffer, window.start_time),
            self.optional_leg(LegType::Post, options.post.as_ref(), window.end_time, window.end_time + buffer),
        )?;

        let legs: Vec<SubAppointment> = pre.into_iter().chain(Some(main)).chain(post).collect();

        debug!(
            "Composed {} legs for {} booking from {} to {}",
            legs.len(),
            booking_type,
            window.start_time,
            window.end_time
        );

        Ok(legs)
    }

    /// Resolves a leg's location, tagging an unmapped location with the leg it was for.
    pub async fn resolve_leg_location(
        &self,
        leg_type: LegType,
        location: &LocationId,
    ) -> Result<LocationIdentity, AppointmentError> {
        self.resolver.resolve(location).await.map_err(|e| match e {
            AppointmentError::LocationNotMapped(identifier) => {
                AppointmentError::LegLocationNotMapped { leg: leg_type, identifier }
            }
            other => other,
        })
    }

    async fn optional_leg(
        &self,
        leg_type: LegType,
        location: Option<&LocationId>,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
    ) -> Result<Option<SubAppointment>, AppointmentError> {
        let Some(location) = location else {
            return Ok(None);
        };

        let identity = self.resolve_leg_location(leg_type, location).await?;
        Ok(Some(SubAppointment::spanning(leg_type, identity.key, starts_at, ends_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clients::{DirectoryLocation, MockLocationMappingApi, MockLocationsApi};
    use chrono::NaiveDate;
    use uuid::Uuid;

    const MAIN_ROOM: i64 = 100;
    const PRE_ROOM: i64 = 200;
    const POST_ROOM: i64 = 300;
    const UNMAPPED_ROOM: i64 = 999;

    fn opaque_for(numeric_id: i64) -> Uuid {
        Uuid::from_u128(numeric_id as u128)
    }

    /// Rooms 100, 200 and 300 are mapped with keys ROOM-100 etc.
    fn composer() -> AppointmentWindowComposer {
        let mut mapping = MockLocationMappingApi::new();
        mapping.expect_opaque_id_for_numeric().returning(|numeric_id| {
            Ok(matches!(numeric_id, MAIN_ROOM | PRE_ROOM | POST_ROOM).then(|| opaque_for(numeric_id)))
        });

        let mut locations = MockLocationsApi::new();
        locations.expect_get_by_opaque_id().returning(|opaque_id| {
            Ok(Some(DirectoryLocation {
                id: opaque_id,
                key: format!("ROOM-{}", opaque_id.as_u128()),
                display_name: None,
            }))
        });

        let resolver = LocationIdentityResolver::new(Arc::new(mapping), Arc::new(locations));
        AppointmentWindowComposer::new(Arc::new(resolver))
    }

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    fn window(start: NaiveDateTime, end: NaiveDateTime) -> AppointmentWindow {
        AppointmentWindow::new(LocationId::Numeric(MAIN_ROOM), start, end, None).unwrap()
    }

    fn both_legs() -> ComposeOptions {
        ComposeOptions::default()
            .with_pre(LocationId::Numeric(PRE_ROOM))
            .with_post(LocationId::Numeric(POST_ROOM))
    }

    #[tokio::test]
    async fn test_simple_booking_is_single_main_leg() {
        let window = window(at("2024-01-10", "14:00"), at("2024-01-10", "15:30"));

        let legs = composer().compose(&window, BookingType::Simple, &both_legs()).await.unwrap();

        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].leg_type, LegType::Main);
        assert_eq!(legs[0].location_key, "ROOM-100");
        assert_eq!(legs[0].starts_at(), window.start_time);
        assert_eq!(legs[0].ends_at(), window.end_time);
    }

    #[tokio::test]
    async fn test_video_link_with_pre_and_post() {
        let window = window(at("2024-01-10", "10:00"), at("2024-01-10", "10:15"));

        let legs = composer()
            .compose(&window, BookingType::CourtVideoLink, &both_legs())
            .await
            .unwrap();

        let summary: Vec<(LegType, &str, String, String, String)> = legs
            .iter()
            .map(|leg| {
                (
                    leg.leg_type,
                    leg.location_key.as_str(),
                    leg.date.to_string(),
                    leg.start_time.format("%H:%M").to_string(),
                    leg.end_time.format("%H:%M").to_string(),
                )
            })
            .collect();

        assert_eq!(
            summary,
            vec![
                (LegType::Pre, "ROOM-200", "2024-01-10".to_string(), "09:45".to_string(), "10:00".to_string()),
                (LegType::Main, "ROOM-100", "2024-01-10".to_string(), "10:00".to_string(), "10:15".to_string()),
                (LegType::Post, "ROOM-300", "2024-01-10".to_string(), "10:15".to_string(), "10:30".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_legs_are_contiguous_with_fixed_buffers() {
        let composer = composer();
        let starts = ["00:00", "07:30", "12:59", "23:00"];

        for start in starts {
            let start_time = at("2024-03-31", start);
            let window = window(start_time, start_time + Duration::minutes(47));
            let legs = composer
                .compose(&window, BookingType::ProbationVideoLink, &both_legs())
                .await
                .unwrap();

            let (pre, main, post) = (&legs[0], &legs[1], &legs[2]);
            assert_eq!(pre.ends_at(), main.starts_at());
            assert_eq!(main.ends_at(), post.starts_at());
            assert_eq!(pre.duration(), Duration::minutes(VIDEO_LINK_BUFFER_MINUTES));
            assert_eq!(post.duration(), Duration::minutes(VIDEO_LINK_BUFFER_MINUTES));
            assert_eq!(main.duration(), Duration::minutes(47));
        }
    }

    #[tokio::test]
    async fn test_pre_leg_just_after_midnight_is_dated_the_previous_day() {
        let window = window(at("2024-01-10", "00:05"), at("2024-01-10", "00:20"));
        let options = ComposeOptions::default().with_pre(LocationId::Numeric(PRE_ROOM));

        let legs = composer()
            .compose(&window, BookingType::CourtVideoLink, &options)
            .await
            .unwrap();

        assert_eq!(legs.len(), 2);
        let pre = &legs[0];
        assert_eq!(pre.leg_type, LegType::Pre);
        assert_eq!(pre.date, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(pre.start_time.format("%H:%M").to_string(), "23:50");
        assert_eq!(pre.end_time.format("%H:%M").to_string(), "00:05");
        assert_eq!(legs[1].date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[tokio::test]
    async fn test_absent_legs_are_omitted() {
        let window = window(at("2024-01-10", "10:00"), at("2024-01-10", "11:00"));
        let options = ComposeOptions::default().with_post(LocationId::Numeric(POST_ROOM));

        let legs = composer()
            .compose(&window, BookingType::CourtVideoLink, &options)
            .await
            .unwrap();

        let types: Vec<LegType> = legs.iter().map(|leg| leg.leg_type).collect();
        assert_eq!(types, vec![LegType::Main, LegType::Post]);
    }

    #[tokio::test]
    async fn test_unmapped_post_location_is_surfaced_for_that_leg() {
        let window = window(at("2024-01-10", "10:00"), at("2024-01-10", "11:00"));
        let options = ComposeOptions::default().with_post(LocationId::Numeric(UNMAPPED_ROOM));

        let result = composer().compose(&window, BookingType::CourtVideoLink, &options).await;

        assert!(matches!(
            result,
            Err(AppointmentError::LegLocationNotMapped { leg: LegType::Post, .. })
        ));
    }

    #[tokio::test]
    async fn test_unmapped_main_location_is_surfaced() {
        let window = AppointmentWindow::new(
            LocationId::Numeric(UNMAPPED_ROOM),
            at("2024-01-10", "10:00"),
            at("2024-01-10", "11:00"),
            None,
        )
        .unwrap();

        let result = composer().compose(&window, BookingType::Simple, &ComposeOptions::default()).await;

        assert!(matches!(
            result,
            Err(AppointmentError::LegLocationNotMapped { leg: LegType::Main, .. })
        ));
    }
}
