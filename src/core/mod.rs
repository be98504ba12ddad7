pub mod booking;
pub mod bridge;
pub mod business;
pub mod dialog;
pub mod idempotency;
pub mod nlu;
pub mod prompt;
pub mod realtime;
pub mod session;
pub mod telemetry;
pub mod telephony;

// Re-export commonly used types for convenience
pub use booking::{BookingApi, HttpBookingClient};
pub use bridge::{Bridge, BridgeRunner, BridgeServices, ToolExecutor};
pub use business::{BusinessProfile, HttpProfileSource, ProfileSource};
pub use dialog::{TurnInput, TurnOutput, TurnPipeline};
pub use nlu::{FieldExtractor, OpenAIFieldExtractor};
pub use prompt::{PromptFormatter, ReceptionistPrompt};
pub use realtime::{ModelConnector, OpenAIConnector, RealtimeError, RealtimeResult};
pub use session::{CallSession, SessionStore};
pub use telemetry::TelemetrySidecar;
