//! OpenAI Realtime API WebSocket message types.
//!
//! Only the subset the phone bridge speaks is modelled. Every other server event
//! deserializes into [`ServerEvent::Unknown`] and is ignored by the bridge.
//!
//! Client events (sent to server):
//! - session.update - Configure audio formats, VAD, instructions and tools
//! - input_audio_buffer.append - Append caller audio
//! - conversation.item.truncate - Cut an interrupted assistant item
//! - conversation.item.create - Submit a function call output
//! - response.create - Ask the model to continue after tool output
//!
//! Server events (received from server):
//! - response.audio.delta / response.output_audio.delta - Audio chunk
//! - input_audio_buffer.speech_started - Caller started talking
//! - response.done - Response complete (function calls, usage)
//! - conversation.item.input_audio_transcription.completed - Caller transcript
//! - response.audio_transcript.done - Assistant transcript
//! - error - Error occurred

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for OpenAI Realtime API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    /// Tool choice strategy ("auto", "none", "required")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
}

impl TurnDetection {
    /// Server VAD with the service defaults.
    pub fn server_vad() -> Self {
        Self::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

/// Tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Function parameters JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl ToolDef {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            tool_type: "function".to_string(),
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters: Some(parameters),
        }
    }
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item. Function calls carry `call_id`, `name` and `arguments`;
/// function call outputs carry `call_id` and `output`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// Build a `function_call_output` item answering `call_id`.
    pub fn function_call_output(call_id: &str, output: String) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.to_string()),
            output: Some(output),
            ..Self::default()
        }
    }

    #[inline]
    pub fn is_function_call(&self) -> bool {
        self.item_type == "function_call"
    }

    /// Sum of transcript characters across audio content parts.
    pub fn transcript_chars(&self) -> usize {
        self.content
            .iter()
            .flatten()
            .filter_map(|part| part.transcript.as_deref())
            .map(|t| t.chars().count())
            .sum()
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append base64 audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    pub fn function_call_output(call_id: &str, output: String) -> Self {
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, output),
        }
    }

    /// Event type name as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ConversationItemTruncate { .. } => "conversation.item.truncate",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    /// Audio chunk of the in-flight assistant item
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        item_id: Option<String>,
        /// Base64-encoded audio
        delta: String,
    },

    /// VAD detected caller speech
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.done")]
    ResponseDone { response: Response },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        item_id: Option<String>,
        transcript: String,
    },

    #[serde(
        rename = "response.audio_transcript.done",
        alias = "response.output_audio_transcript.done"
    )]
    AudioTranscriptDone {
        #[serde(default)]
        item_id: Option<String>,
        transcript: String,
    },

    /// Any event type the bridge does not act on
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Response information carried by `response.done`.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<ConversationItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl Response {
    pub fn function_calls(&self) -> impl Iterator<Item = &ConversationItem> {
        self.output.iter().filter(|item| item.is_function_call())
    }

    pub fn transcript_chars(&self) -> usize {
        self.output.iter().map(ConversationItem::transcript_chars).sum()
    }
}

/// Token usage.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_serialization() {
        let event = ClientEvent::ConversationItemTruncate {
            item_id: "item_1".to_string(),
            content_index: 0,
            audio_end_ms: 450,
        };
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "conversation.item.truncate");
        assert_eq!(json["item_id"], "item_1");
        assert_eq!(json["audio_end_ms"], 450);
    }

    #[test]
    fn test_function_call_output_serialization() {
        let event = ClientEvent::function_call_output("call_9", r#"{"available":true}"#.into());
        let json: Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "function_call_output");
        assert_eq!(json["item"]["call_id"], "call_9");
        assert!(json["item"].get("id").is_none());
    }

    #[test]
    fn test_response_create_serialization() {
        let json = serde_json::to_string(&ClientEvent::ResponseCreate).unwrap();
        assert_eq!(json, r#"{"type":"response.create"}"#);
    }

    #[test]
    fn test_session_update_skips_empty_fields() {
        let config = SessionConfig {
            voice: Some("alloy".to_string()),
            turn_detection: Some(TurnDetection::server_vad()),
            ..SessionConfig::default()
        };
        let json: Value = serde_json::to_value(ClientEvent::SessionUpdate { session: config }).unwrap();
        assert_eq!(json["session"]["voice"], "alloy");
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
        assert!(json["session"].get("instructions").is_none());
    }

    #[test]
    fn test_audio_delta_aliases() {
        for kind in ["response.audio.delta", "response.output_audio.delta"] {
            let json = format!(r#"{{"type":"{kind}","item_id":"it","delta":"AAA="}}"#);
            match serde_json::from_str::<ServerEvent>(&json).unwrap() {
                ServerEvent::AudioDelta { item_id, delta, .. } => {
                    assert_eq!(item_id.as_deref(), Some("it"));
                    assert_eq!(delta, "AAA=");
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_event_type() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unknown));
    }

    #[test]
    fn test_response_done_function_calls_and_usage() {
        let json = r#"{
            "type": "response.done",
            "response": {
                "id": "resp_1",
                "status": "completed",
                "output": [
                    {"type": "message", "role": "assistant",
                     "content": [{"type": "audio", "transcript": "Hello there"}]},
                    {"type": "function_call", "call_id": "call_1",
                     "name": "check_availability", "arguments": "{\"date\":\"2025-01-02\"}"}
                ],
                "usage": {"total_tokens": 120, "input_tokens": 80, "output_tokens": 40}
            }
        }"#;
        let ServerEvent::ResponseDone { response } = serde_json::from_str(json).unwrap() else {
            panic!("expected response.done");
        };
        let calls: Vec<_> = response.function_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name.as_deref(), Some("check_availability"));
        assert_eq!(response.transcript_chars(), "Hello there".len());
        assert_eq!(response.usage.unwrap().total_tokens, 120);
    }

    #[test]
    fn test_error_event() {
        let json = r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::Error { error } => assert_eq!(error.message, "bad"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
