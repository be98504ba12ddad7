//! Appointment-booking dialogue: slot types, the resolver cascade and the
//! turn pipeline that drives it.

mod locks;
pub mod pipeline;
pub mod resolver;
mod types;

pub use locks::{CallGuard, CallLocks};
pub use pipeline::{
    APOLOGY_REPLY, BOOK_APPOINTMENT_TOOL, CHECK_AVAILABILITY_TOOL, TurnFault, TurnInput,
    TurnOutput, TurnPipeline,
};
pub use resolver::{DEFAULT_TIMEZONE, FALLBACK_REPLY};
pub use types::{ExtractedFields, Intent};
