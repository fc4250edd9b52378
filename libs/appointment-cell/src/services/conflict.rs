// libs/appointment-cell/src/services/conflict.rs
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use crate::models::{
    AppointmentError, AvailabilityReport, BookingLifecycle, Clash, ExistingEvent, LocationEvents,
    ScheduledEvent, SubAppointment,
};
use crate::services::clients::ScheduleApi;
use crate::services::location::LocationIdentityResolver;

type EventTuple<'a> = (&'a str, &'a str, NaiveDateTime, NaiveDateTime);

/// Drops events that are the booking's own legs, matched on
/// `(subject, location key, start, end)` with exact equality.
///
/// Survivors keep their input order. An event without a resolved location never matches.
pub fn filter_own_legs(
    events: Vec<ExistingEvent>,
    offender_ref: &str,
    legs: &[SubAppointment],
) -> Vec<ExistingEvent> {
    let own: HashSet<EventTuple<'_>> = legs
        .iter()
        .map(|leg| (offender_ref, leg.location_key.as_str(), leg.starts_at(), leg.ends_at()))
        .collect();

    events
        .into_iter()
        .filter(|existing| {
            let Some(location_key) = existing.location_key.as_deref() else {
                return true;
            };
            let tuple = (
                existing.event.subject_id.as_str(),
                location_key,
                existing.event.start_time,
                existing.event.end_time,
            );
            !own.contains(&tuple)
        })
        .collect()
}

fn overlaps(leg: &SubAppointment, event: &ScheduledEvent) -> bool {
    event.start_time < leg.ends_at() && leg.starts_at() < event.end_time
}

/// Pairs every event with each leg it overlaps. Touching intervals do not overlap.
pub fn find_clashes(events: &[ExistingEvent], legs: &[SubAppointment]) -> Vec<Clash> {
    legs.iter()
        .flat_map(|leg| {
            events
                .iter()
                .filter(move |existing| overlaps(leg, &existing.event))
                .map(move |existing| Clash {
                    leg_type: leg.leg_type,
                    event: existing.clone(),
                })
        })
        .collect()
}

/// Finds what else is already booked for the prisoner and the rooms a set of legs uses.
pub struct AvailabilityService {
    schedule: Arc<dyn ScheduleApi>,
    resolver: Arc<LocationIdentityResolver>,
}

impl AvailabilityService {
    pub fn new(schedule: Arc<dyn ScheduleApi>, resolver: Arc<LocationIdentityResolver>) -> Self {
        Self { schedule, resolver }
    }

    /// Own legs are only filtered out for an `Existing` booking. For a `New` one, an event matching
    /// a leg exactly is a duplicate booking and is reported as a clash.
    pub async fn check(
        &self,
        offender_ref: &str,
        legs: &[SubAppointment],
        lifecycle: BookingLifecycle,
    ) -> Result<AvailabilityReport, AppointmentError> {
        let own_legs: &[SubAppointment] = match lifecycle {
            BookingLifecycle::Existing(_) => legs,
            BookingLifecycle::New => &[],
        };

        // A PRE leg can start the day before its MAIN leg
        let dates: BTreeSet<NaiveDate> = legs.iter().map(|leg| leg.date).collect();
        let keys: BTreeSet<&str> = legs.iter().map(|leg| leg.location_key.as_str()).collect();

        let identities = try_join_all(keys.iter().map(|key| self.resolver.from_key(key))).await?;
        let mut key_by_numeric_id: HashMap<i64, String> = identities
            .iter()
            .map(|identity| (identity.numeric_id, identity.key.clone()))
            .collect();

        let offender_queries = dates
            .iter()
            .map(|date| self.schedule.events_for_offender(offender_ref, *date));
        let location_queries = identities.iter().flat_map(|identity| {
            dates.iter().map(move |date| async move {
                let events = self.schedule.events_for_location(identity.numeric_id, *date).await?;
                Ok::<_, AppointmentError>((identity.key.clone(), events))
            })
        });

        let (offender_batches, location_batches) =
            futures::try_join!(try_join_all(offender_queries), try_join_all(location_queries))?;

        let offender_events: Vec<ScheduledEvent> = offender_batches.into_iter().flatten().collect();

        let unknown_ids: BTreeSet<i64> = offender_events
            .iter()
            .filter_map(|event| event.location_id)
            .filter(|id| !key_by_numeric_id.contains_key(id))
            .collect();
        let resolved = try_join_all(unknown_ids.iter().map(|id| self.event_location_key(*id))).await?;
        key_by_numeric_id.extend(
            unknown_ids
                .iter()
                .zip(resolved)
                .filter_map(|(id, key)| key.map(|key| (*id, key))),
        );

        let offender_events: Vec<ExistingEvent> = offender_events
            .into_iter()
            .map(|event| ExistingEvent {
                location_key: event.location_id.and_then(|id| key_by_numeric_id.get(&id).cloned()),
                event,
            })
            .collect();
        let offender_events = filter_own_legs(offender_events, offender_ref, own_legs);

        let mut grouped: Vec<LocationEvents> = Vec::new();
        for (key, events) in location_batches {
            let existing: Vec<ExistingEvent> = events
                .into_iter()
                .map(|event| ExistingEvent {
                    location_key: Some(key.clone()),
                    event,
                })
                .collect();

            match grouped.iter_mut().find(|group| group.location_key == key) {
                Some(group) => group.events.extend(existing),
                None => grouped.push(LocationEvents {
                    location_key: key,
                    events: existing,
                }),
            }
        }

        let location_events: Vec<LocationEvents> = grouped
            .into_iter()
            .map(|group| LocationEvents {
                events: filter_own_legs(group.events, offender_ref, own_legs),
                location_key: group.location_key,
            })
            .collect();

        let mut clashes = find_clashes(&offender_events, legs);
        for group in &location_events {
            let legs_here: Vec<SubAppointment> = legs
                .iter()
                .filter(|leg| leg.location_key == group.location_key)
                .cloned()
                .collect();

            for clash in find_clashes(&group.events, &legs_here) {
                if !clashes.contains(&clash) {
                    clashes.push(clash);
                }
            }
        }

        if clashes.is_empty() {
            debug!("No clashes for {} across {} legs", offender_ref, legs.len());
        } else {
            info!("{} clashes found for {}", clashes.len(), offender_ref);
        }

        Ok(AvailabilityReport {
            legs: legs.to_vec(),
            offender_events,
            location_events,
            clashes,
        })
    }

    async fn event_location_key(&self, numeric_id: i64) -> Result<Option<String>, AppointmentError> {
        match self.resolver.from_numeric_id(numeric_id).await {
            Ok(identity) => Ok(Some(identity.key)),
            Err(AppointmentError::LocationNotMapped(identifier)) => {
                warn!("Event location {} is not mapped, keeping event unmatched", identifier);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
