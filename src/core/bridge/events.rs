//! Inputs and outputs of the bridge state machine.

use serde_json::Value;

use crate::core::idempotency::TurnRole;
use crate::core::realtime::{ClientEvent, ServerEvent};
use crate::core::telephony::{MediaStreamFrame, OutboundFrame};

/// Call metadata carried by the transport's start frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMetadata {
    pub call_id: Option<String>,
    pub business_id: Option<String>,
    pub caller_phone: Option<String>,
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub call_id: String,
    pub response_id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    // Transport leg
    TransportStarted {
        stream_id: String,
        metadata: CallMetadata,
    },
    TransportMedia {
        timestamp_ms: u64,
        payload: String,
    },
    TransportMark {
        name: String,
    },
    TransportClosed,

    // Model leg
    ModelOpened,
    ModelAudioDelta {
        item_id: Option<String>,
        delta: String,
    },
    ModelSpeechStarted,
    ModelToolCalls(Vec<ToolCall>),
    ModelUsage {
        llm_tokens: u64,
        tts_characters: u64,
    },
    ModelTranscript {
        role: TurnRole,
        text: String,
    },
    ModelError {
        message: String,
    },
    ModelClosed,

    /// Result of a tool call, ready to hand back to the model
    ToolCompleted {
        call_id: String,
        input: Value,
        output: Value,
    },
}

impl BridgeEvent {
    /// Translate a transport frame. `Connected` and unknown frames carry nothing.
    pub fn from_transport(frame: MediaStreamFrame) -> Option<Self> {
        match frame {
            MediaStreamFrame::Start { stream_sid, start } => {
                let stream_id = stream_sid.or_else(|| start.stream_sid.clone())?;
                let metadata = CallMetadata {
                    call_id: start.call_sid.clone(),
                    business_id: start.parameter("businessId").map(str::to_string),
                    caller_phone: start.parameter("callerPhone").map(str::to_string),
                };
                Some(Self::TransportStarted {
                    stream_id,
                    metadata,
                })
            }
            MediaStreamFrame::Media { media } => Some(Self::TransportMedia {
                timestamp_ms: media.timestamp,
                payload: media.payload,
            }),
            MediaStreamFrame::Mark { mark } => Some(Self::TransportMark { name: mark.name }),
            MediaStreamFrame::Stop => Some(Self::TransportClosed),
            MediaStreamFrame::Connected | MediaStreamFrame::Unknown => None,
        }
    }

    /// Translate a model event. A `response.done` may carry both tool calls and
    /// usage, so it can yield more than one event.
    pub fn from_model(event: ServerEvent) -> Vec<Self> {
        match event {
            ServerEvent::AudioDelta { item_id, delta, .. } => {
                vec![Self::ModelAudioDelta { item_id, delta }]
            }
            ServerEvent::SpeechStarted { .. } => vec![Self::ModelSpeechStarted],
            ServerEvent::ResponseDone { response } => {
                let mut events = Vec::with_capacity(2);
                let calls: Vec<ToolCall> = response
                    .function_calls()
                    .filter_map(|item| {
                        Some(ToolCall {
                            call_id: item.call_id.clone()?,
                            response_id: response.id.clone(),
                            name: item.name.clone()?,
                            arguments: item.arguments.clone().unwrap_or_default(),
                        })
                    })
                    .collect();
                if !calls.is_empty() {
                    events.push(Self::ModelToolCalls(calls));
                }
                if let Some(usage) = &response.usage {
                    events.push(Self::ModelUsage {
                        llm_tokens: usage.total_tokens,
                        tts_characters: response.transcript_chars() as u64,
                    });
                }
                events
            }
            ServerEvent::TranscriptionCompleted { transcript, .. } => vec![Self::ModelTranscript {
                role: TurnRole::User,
                text: transcript,
            }],
            ServerEvent::AudioTranscriptDone { transcript, .. } => vec![Self::ModelTranscript {
                role: TurnRole::Assistant,
                text: transcript,
            }],
            ServerEvent::Error { error } => vec![Self::ModelError {
                message: error.message,
            }],
            ServerEvent::Unknown => Vec::new(),
        }
    }
}

/// Side effects requested by the bridge. The runner performs them in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    SendTransport(OutboundFrame),
    SendModel(ClientEvent),
    /// Open the model leg for this call
    OpenModel(CallMetadata),
    InvokeTool(ToolCall),
    EmitTranscript {
        role: TurnRole,
        text: String,
    },
    EmitTool {
        name: String,
        input: Value,
        output: Value,
    },
    EmitUsage {
        llm_tokens: u64,
        tts_characters: u64,
    },
    CloseTransport,
    CloseModel,
}
