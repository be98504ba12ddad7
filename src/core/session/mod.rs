//! Per-call dialogue session state.

mod clock;
mod model;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use model::{CallSession, DialogStep, SessionPatch};
pub use store::{DEFAULT_SESSION_TTL, SessionStore};
