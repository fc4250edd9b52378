// libs/appointment-cell/src/services/mod.rs

pub mod booking;
pub mod clients;
pub mod composer;
pub mod conflict;
pub mod lifecycle;
pub mod location;
pub mod recurrence;
pub mod validation;
pub mod wizard;

pub use booking::{BookingCollaborators, BookingWizardService, Clock, FixedClock, SystemClock};
pub use clients::{
    BookingStore, DirectoryLocation, HttpBookingStore, HttpLocationMappingApi, HttpLocationsApi,
    HttpScheduleApi, LocationMappingApi, LocationsApi, ScheduleApi,
};
pub use composer::AppointmentWindowComposer;
pub use conflict::{filter_own_legs, find_clashes, AvailabilityService};
pub use lifecycle::{BookingDecision, BookingLifecycleDecider};
pub use location::LocationIdentityResolver;
pub use recurrence::calculate_last_occurrence;
pub use wizard::{InMemoryWizardCache, RedisWizardCache, WizardCache, WizardStateCoordinator};
