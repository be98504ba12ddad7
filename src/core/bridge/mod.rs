//! Audio bridge between a telephony media stream and a realtime voice model.
//!
//! One [`BridgeRunner`] per call feeds transport frames, model events and tool
//! results into a [`Bridge`] state machine and executes the resulting actions.
//! Barge-in is handled by truncating the assistant item at the caller's playback
//! position and clearing the transport's buffered audio.

mod bridge;
mod events;
mod runner;
mod state;
mod tools;

pub use bridge::Bridge;
pub use events::{BridgeAction, BridgeEvent, CallMetadata, ToolCall};
pub use runner::{BridgeRunner, BridgeServices, TransportRoute};
pub use state::{AudioSessionState, BridgePhase, PendingToolCall};
pub use tools::{ToolContext, ToolExecutor, tool_definitions};
