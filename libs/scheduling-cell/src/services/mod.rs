pub mod booking;
pub mod conflict;
pub mod consistency;
pub mod recurrence;

pub use booking::BookingService;
pub use conflict::ConflictDetectionService;
pub use consistency::TherapistLockRegistry;
pub use recurrence::RecurrenceService;
