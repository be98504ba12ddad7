//! Realtime speech-to-speech model sessions.

mod base;
pub mod openai;

pub use base::{ModelConnector, ModelSocket, RealtimeError, RealtimeResult};
pub use openai::{ClientEvent, OpenAIConnector, ServerEvent};
