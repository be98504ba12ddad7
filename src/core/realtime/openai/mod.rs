//! OpenAI Realtime API integration.

mod config;
mod connector;
mod messages;

pub use config::{
    INPUT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeAudioFormat,
    OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
pub use connector::OpenAIConnector;
pub use messages::{
    ApiError, ClientEvent, ContentPart, ConversationItem, InputAudioTranscription, Response,
    ServerEvent, SessionConfig, ToolDef, TurnDetection, Usage,
};
