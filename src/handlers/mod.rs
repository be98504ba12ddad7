//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `agent_chat` - Text dialogue turns
//! - `voice` - Inbound call webhook returning TwiML
//! - `media_stream` - Telephony media stream WebSocket

pub mod agent_chat;
pub mod api;
pub mod media_stream;
pub mod voice;

pub use agent_chat::agent_chat_handler;
pub use media_stream::media_stream_handler;
pub use voice::voice_webhook_handler;
