//! Best-effort telemetry: transcripts, tool invocations and usage metering.

mod events;
mod sidecar;

pub use events::{ToolEvent, TranscriptEvent, UsageEvent, now_millis};
pub use sidecar::{DEFAULT_TELEMETRY_TIMEOUT, DeliveryOutcome, TelemetrySidecar, deliver};
