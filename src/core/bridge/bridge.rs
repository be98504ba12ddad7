//! Per-call audio bridge between the telephony stream and the realtime model.
//!
//! [`Bridge::handle`] is a pure transition: it updates the call's
//! [`AudioSessionState`] and returns the side effects to perform. All events of
//! one call are fed through the same `Bridge`, so the state has a single owner.

use tracing::{debug, info, warn};

use super::events::{BridgeAction, BridgeEvent, CallMetadata, ToolCall};
use super::state::{AudioSessionState, BridgePhase, PendingToolCall};
use crate::core::realtime::ClientEvent;
use crate::core::telephony::OutboundFrame;

#[derive(Debug, Default)]
pub struct Bridge {
    phase: BridgePhase,
    state: AudioSessionState,
    metadata: CallMetadata,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == BridgePhase::Closed
    }

    pub fn state(&self) -> &AudioSessionState {
        &self.state
    }

    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    /// Identifier used for telemetry: the telephony call id, else the stream id.
    pub fn call_id(&self) -> Option<&str> {
        self.metadata
            .call_id
            .as_deref()
            .or(self.state.stream_id.as_deref())
    }

    pub fn handle(&mut self, event: BridgeEvent) -> Vec<BridgeAction> {
        if self.is_closed() {
            return Vec::new();
        }

        match event {
            BridgeEvent::TransportStarted {
                stream_id,
                metadata,
            } => self.on_start(stream_id, metadata),
            BridgeEvent::TransportMedia {
                timestamp_ms,
                payload,
            } => self.on_media(timestamp_ms, payload),
            BridgeEvent::TransportMark { name } => {
                if self.state.ack_mark().is_none() {
                    debug!(mark = %name, "Mark acknowledged with empty queue");
                }
                Vec::new()
            }
            BridgeEvent::TransportClosed => {
                info!(call_id = ?self.call_id(), "Transport leg closed");
                self.close(BridgeAction::CloseModel)
            }
            BridgeEvent::ModelOpened => {
                if self.phase == BridgePhase::Connecting {
                    self.phase = BridgePhase::Active;
                }
                Vec::new()
            }
            BridgeEvent::ModelAudioDelta { item_id, delta } => self.on_audio_delta(item_id, delta),
            BridgeEvent::ModelSpeechStarted => self.on_speech_started(),
            BridgeEvent::ModelToolCalls(calls) => self.on_tool_calls(calls),
            BridgeEvent::ModelUsage {
                llm_tokens,
                tts_characters,
            } => vec![BridgeAction::EmitUsage {
                llm_tokens,
                tts_characters,
            }],
            BridgeEvent::ModelTranscript { role, text } => {
                if text.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![BridgeAction::EmitTranscript { role, text }]
                }
            }
            BridgeEvent::ModelError { message } => {
                warn!(call_id = ?self.call_id(), error = %message, "Realtime model error");
                Vec::new()
            }
            BridgeEvent::ModelClosed => {
                info!(call_id = ?self.call_id(), "Model leg closed");
                self.close(BridgeAction::CloseTransport)
            }
            BridgeEvent::ToolCompleted {
                call_id,
                input,
                output,
            } => self.on_tool_completed(call_id, input, output),
        }
    }

    fn on_start(&mut self, stream_id: String, metadata: CallMetadata) -> Vec<BridgeAction> {
        info!(stream_id = %stream_id, call_id = ?metadata.call_id, "Media stream started");
        self.state.bind_stream(stream_id);
        self.metadata = metadata;

        if self.phase == BridgePhase::Connecting {
            vec![BridgeAction::OpenModel(self.metadata.clone())]
        } else {
            Vec::new()
        }
    }

    fn on_media(&mut self, timestamp_ms: u64, payload: String) -> Vec<BridgeAction> {
        self.state.latest_media_timestamp_ms = timestamp_ms;
        if self.phase != BridgePhase::Active {
            return Vec::new();
        }
        vec![BridgeAction::SendModel(ClientEvent::InputAudioBufferAppend {
            audio: payload,
        })]
    }

    fn on_audio_delta(&mut self, item_id: Option<String>, delta: String) -> Vec<BridgeAction> {
        let Some(stream_id) = self.state.stream_id.clone() else {
            debug!("Dropping model audio before the stream is bound");
            return Vec::new();
        };

        if self.state.response_start_timestamp_ms.is_none() {
            self.state.response_start_timestamp_ms = Some(self.state.latest_media_timestamp_ms);
        }
        if item_id.is_some() {
            self.state.last_assistant_item_id = item_id;
        }
        let mark = self.state.push_mark();

        vec![
            BridgeAction::SendTransport(OutboundFrame::media(&stream_id, delta)),
            BridgeAction::SendTransport(OutboundFrame::mark(&stream_id, mark)),
        ]
    }

    /// Barge-in: cut the assistant item at what the caller actually heard and
    /// flush audio still buffered on the transport.
    fn on_speech_started(&mut self) -> Vec<BridgeAction> {
        if !self.state.is_playing() {
            return Vec::new();
        }
        let elapsed = self.state.elapsed_ms().unwrap_or(0);
        let mut actions = Vec::with_capacity(2);

        if let Some(item_id) = self.state.last_assistant_item_id.clone() {
            debug!(item_id = %item_id, elapsed_ms = elapsed, "Truncating interrupted response");
            actions.push(BridgeAction::SendModel(ClientEvent::ConversationItemTruncate {
                item_id,
                content_index: 0,
                audio_end_ms: elapsed,
            }));
        }
        if let Some(stream_id) = self.state.stream_id.as_deref() {
            actions.push(BridgeAction::SendTransport(OutboundFrame::clear(stream_id)));
        }

        self.state.reset_playback();
        actions
    }

    fn on_tool_calls(&mut self, calls: Vec<ToolCall>) -> Vec<BridgeAction> {
        calls
            .into_iter()
            .map(|call| {
                debug!(tool = %call.name, call_id = %call.call_id, "Model requested tool");
                self.state.pending_tool_calls.insert(
                    call.call_id.clone(),
                    PendingToolCall {
                        name: call.name.clone(),
                        response_id: call.response_id.clone(),
                    },
                );
                BridgeAction::InvokeTool(call)
            })
            .collect()
    }

    fn on_tool_completed(
        &mut self,
        call_id: String,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Vec<BridgeAction> {
        let Some(pending) = self.state.pending_tool_calls.remove(&call_id) else {
            debug!(call_id = %call_id, "Discarding result for unknown tool call");
            return Vec::new();
        };
        debug!(
            tool = %pending.name,
            response_id = %pending.response_id,
            "Submitting tool output"
        );

        let mut actions = vec![BridgeAction::SendModel(ClientEvent::function_call_output(
            &call_id,
            output.to_string(),
        ))];
        // One response.create per model response, once all of its calls are answered.
        let siblings_pending = self
            .state
            .pending_tool_calls
            .values()
            .any(|p| p.response_id == pending.response_id);
        if siblings_pending {
            debug!(response_id = %pending.response_id, "Waiting for remaining tool outputs");
        } else {
            actions.push(BridgeAction::SendModel(ClientEvent::ResponseCreate));
        }
        actions.push(BridgeAction::EmitTool {
            name: pending.name,
            input,
            output,
        });
        actions
    }

    fn close(&mut self, other_leg: BridgeAction) -> Vec<BridgeAction> {
        self.phase = BridgePhase::Closed;
        self.state.pending_tool_calls.clear();
        vec![other_leg]
    }
}
