//! Availability and booking calls against the external scheduling backend.

mod client;
mod outcome;
mod schedule;

pub use client::{
    AvailabilityRequest, BookingApi, BookingError, BookingRequest, BookingResult,
    HttpBookingClient,
};
pub use outcome::{AvailabilityOutcome, BookingOutcome, error_message};
pub use schedule::{appointment_start, parse_clock_time};
