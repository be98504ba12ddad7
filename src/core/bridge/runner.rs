//! Drives one [`Bridge`] per call: pumps transport frames, model events and
//! finished tool calls through the state machine and performs its actions.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::select;
use tokio::sync::mpsc;
use tokio::task::{Id as TaskId, JoinSet};
use tracing::{debug, info, warn};

use super::bridge::Bridge;
use super::events::{BridgeAction, BridgeEvent, CallMetadata, ToolCall};
use super::tools::{ToolContext, ToolExecutor, tool_definitions};
use crate::core::business::{BusinessProfile, ProfileSource, load_or_fallback};
use crate::core::idempotency::TurnRole;
use crate::core::prompt::PromptFormatter;
use crate::core::realtime::openai::{
    INPUT_TRANSCRIPTION_MODEL, InputAudioTranscription, OpenAIRealtimeAudioFormat, SessionConfig,
    TurnDetection,
};
use crate::core::realtime::{ClientEvent, ModelConnector, ModelSocket, ServerEvent};
use crate::core::session::SessionStore;
use crate::core::telemetry::{TelemetrySidecar, ToolEvent, TranscriptEvent, UsageEvent};
use crate::core::telephony::OutboundFrame;

/// Messages for the transport's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportRoute {
    Frame(OutboundFrame),
    Close,
}

/// Shared collaborators for every call's bridge.
#[derive(Clone)]
pub struct BridgeServices {
    pub connector: Arc<dyn ModelConnector>,
    pub prompts: Arc<dyn PromptFormatter>,
    pub profiles: Arc<dyn ProfileSource>,
    pub tools: ToolExecutor,
    pub telemetry: TelemetrySidecar,
    pub sessions: Arc<SessionStore>,
}

pub struct BridgeRunner {
    services: BridgeServices,
    bridge: Bridge,
    outbound: mpsc::Sender<TransportRoute>,
    model: Option<ModelSocket>,
    tool_ctx: Option<ToolContext>,
    tool_tasks: JoinSet<BridgeEvent>,
    /// Call id and raw arguments of each in-flight tool task
    tool_calls: HashMap<TaskId, (String, String)>,
    current_turn: Option<u64>,
    tool_ordinal: u32,
}

async fn next_model_event(model: &mut Option<ModelSocket>) -> Option<ServerEvent> {
    match model {
        Some(socket) => socket.events.recv().await,
        None => std::future::pending().await,
    }
}

impl BridgeRunner {
    pub fn new(services: BridgeServices, outbound: mpsc::Sender<TransportRoute>) -> Self {
        Self {
            services,
            bridge: Bridge::new(),
            outbound,
            model: None,
            tool_ctx: None,
            tool_tasks: JoinSet::new(),
            tool_calls: HashMap::new(),
            current_turn: None,
            tool_ordinal: 0,
        }
    }

    /// Runs until either leg closes. A closed `transport` channel counts as the
    /// transport leg closing.
    pub async fn run(mut self, mut transport: mpsc::Receiver<BridgeEvent>) {
        loop {
            let events = select! {
                event = transport.recv() => vec![event.unwrap_or(BridgeEvent::TransportClosed)],
                event = next_model_event(&mut self.model) => match event {
                    Some(event) => BridgeEvent::from_model(event),
                    None => vec![BridgeEvent::ModelClosed],
                },
                Some(joined) = self.tool_tasks.join_next_with_id(), if !self.tool_tasks.is_empty() => {
                    match joined {
                        Ok((id, event)) => {
                            self.tool_calls.remove(&id);
                            vec![event]
                        }
                        Err(e) => match self.tool_calls.remove(&e.id()) {
                            Some((call_id, arguments)) => {
                                warn!(call_id = %call_id, error = %e, "Tool task failed");
                                vec![BridgeEvent::ToolCompleted {
                                    call_id,
                                    input: serde_json::Value::String(arguments),
                                    output: serde_json::json!({ "ok": false, "error": "tool failed" }),
                                }]
                            }
                            None => continue,
                        },
                    }
                }
            };

            for event in events {
                self.dispatch(event).await;
            }
            if self.bridge.is_closed() {
                break;
            }
        }

        // Late tool results are abandoned with the call.
        self.tool_tasks.abort_all();
        self.tool_calls.clear();
        self.model = None;
        info!(call_id = ?self.bridge.call_id(), "Bridge finished");
    }

    async fn dispatch(&mut self, event: BridgeEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for action in self.bridge.handle(event) {
                if let Some(follow_up) = self.apply(action).await {
                    queue.push_back(follow_up);
                }
            }
        }
    }

    async fn apply(&mut self, action: BridgeAction) -> Option<BridgeEvent> {
        match action {
            BridgeAction::SendTransport(frame) => {
                if self.outbound.send(TransportRoute::Frame(frame)).await.is_err() {
                    return Some(BridgeEvent::TransportClosed);
                }
                None
            }
            BridgeAction::SendModel(event) => {
                let socket = self.model.as_ref()?;
                if socket.send(event).await.is_err() {
                    return Some(BridgeEvent::ModelClosed);
                }
                None
            }
            BridgeAction::OpenModel(metadata) => Some(self.open_model(metadata).await),
            BridgeAction::InvokeTool(call) => {
                self.spawn_tool(call);
                None
            }
            BridgeAction::EmitTranscript { role, text } => {
                self.emit_transcript(role, text);
                None
            }
            BridgeAction::EmitTool {
                name,
                input,
                output,
            } => {
                let call_id = self.bridge.call_id()?.to_string();
                let turn = self.current_turn_or_next(&call_id);
                let ordinal = self.tool_ordinal;
                self.tool_ordinal += 1;
                self.services
                    .telemetry
                    .tool(ToolEvent::new(&call_id, turn, &name, ordinal, input, output));
                None
            }
            BridgeAction::EmitUsage {
                llm_tokens,
                tts_characters,
            } => {
                let call_id = self.bridge.call_id()?;
                self.services
                    .telemetry
                    .usage(UsageEvent::new(call_id, llm_tokens, tts_characters));
                None
            }
            BridgeAction::CloseTransport => {
                let _ = self.outbound.send(TransportRoute::Close).await;
                None
            }
            BridgeAction::CloseModel => {
                self.model = None;
                None
            }
        }
    }

    async fn open_model(&mut self, metadata: CallMetadata) -> BridgeEvent {
        let business_id = metadata.business_id.clone().unwrap_or_default();
        let profile = if business_id.is_empty() {
            warn!("Media stream started without a businessId");
            BusinessProfile::fallback(&business_id)
        } else {
            load_or_fallback(self.services.profiles.as_ref(), &business_id).await
        };

        let socket = match self.services.connector.connect().await {
            Ok(socket) => socket,
            Err(e) => {
                warn!(business_id = %business_id, error = %e, "Failed to open realtime session");
                return BridgeEvent::ModelClosed;
            }
        };

        let session = self.session_config(&profile);
        if socket.send(ClientEvent::SessionUpdate { session }).await.is_err() {
            return BridgeEvent::ModelClosed;
        }

        debug!(business_id = %business_id, "Realtime session configured");
        self.tool_ctx = Some(ToolContext {
            business_id,
            caller_phone: metadata.caller_phone,
            profile: Arc::new(profile),
        });
        self.model = Some(socket);
        BridgeEvent::ModelOpened
    }

    fn session_config(&self, profile: &BusinessProfile) -> SessionConfig {
        let audio = OpenAIRealtimeAudioFormat::G711Ulaw.as_str().to_string();
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(self.services.prompts.instructions(profile)),
            voice: Some(self.services.connector.voice().to_string()),
            input_audio_format: Some(audio.clone()),
            output_audio_format: Some(audio),
            input_audio_transcription: Some(InputAudioTranscription {
                model: INPUT_TRANSCRIPTION_MODEL.to_string(),
            }),
            turn_detection: Some(TurnDetection::server_vad()),
            tools: Some(tool_definitions()),
            tool_choice: Some("auto".to_string()),
        }
    }

    fn spawn_tool(&mut self, call: ToolCall) {
        let executor = self.services.tools.clone();
        let ctx = self.tool_ctx.clone();
        let tracked = (call.call_id.clone(), call.arguments.clone());
        let handle = self.tool_tasks.spawn(async move {
            let (input, output) = match ctx {
                Some(ctx) => executor.execute(&call, &ctx).await,
                None => (
                    serde_json::Value::String(call.arguments.clone()),
                    serde_json::json!({ "ok": false, "error": "call is not ready" }),
                ),
            };
            BridgeEvent::ToolCompleted {
                call_id: call.call_id,
                input,
                output,
            }
        });
        self.tool_calls.insert(handle.id(), tracked);
    }

    fn emit_transcript(&mut self, role: TurnRole, text: String) {
        let Some(call_id) = self.bridge.call_id().map(str::to_string) else {
            return;
        };
        let turn = match role {
            TurnRole::User => {
                let turn = self.services.sessions.turns().next(&call_id);
                self.current_turn = Some(turn);
                self.tool_ordinal = 0;
                turn
            }
            _ => self.current_turn_or_next(&call_id),
        };
        self.services
            .telemetry
            .transcript(TranscriptEvent::new(&call_id, role, turn, text));
    }

    /// Current turn, allocating one if the assistant speaks before the caller.
    fn current_turn_or_next(&mut self, call_id: &str) -> u64 {
        match self.current_turn {
            Some(turn) => turn,
            None => {
                let turn = self.services.sessions.turns().next(call_id);
                self.current_turn = Some(turn);
                turn
            }
        }
    }
}
