//! One text turn, end to end.
//!
//! profile → extraction → merge → resolve → tool calls → reply. Collaborator
//! failures degrade to fallbacks inside the pipeline; anything that still
//! escapes (a panic) is caught at [`TurnPipeline::handle_turn`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Value, json};
use thiserror::Error;
use time::macros::format_description;
use tracing::{debug, error, info, warn};

use super::locks::CallLocks;
use super::resolver::{
    AfterAvailability, Decision, Reply, ResolveContext, after_availability, after_booking, resolve,
};
use crate::core::booking::BookingApi;
use crate::core::business::{ProfileSource, load_or_fallback};
use crate::core::idempotency::TurnRole;
use crate::core::nlu::{ExtractionContext, FieldExtractor, extract_or_unknown};
use crate::core::session::{CallSession, SessionPatch, SessionStore};
use crate::core::telemetry::{TelemetrySidecar, ToolEvent, TranscriptEvent};

/// Reply returned when a turn fails unexpectedly.
pub const APOLOGY_REPLY: &str =
    "I'm sorry, something went wrong on my end. Could you please repeat that?";

pub const CHECK_AVAILABILITY_TOOL: &str = "check_availability";
pub const BOOK_APPOINTMENT_TOOL: &str = "book_appointment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnInput {
    pub business_id: String,
    pub call_id: String,
    pub text: String,
    pub caller_phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutput {
    pub reply: String,
    pub state: CallSession,
}

#[derive(Debug, Error)]
pub enum TurnFault {
    #[error("turn pipeline panicked: {0}")]
    Panicked(String),
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Clone)]
pub struct TurnPipeline {
    sessions: Arc<SessionStore>,
    telemetry: TelemetrySidecar,
    booking: Arc<dyn BookingApi>,
    profiles: Arc<dyn ProfileSource>,
    extractor: Arc<dyn FieldExtractor>,
    locks: CallLocks,
    default_timezone: String,
}

impl TurnPipeline {
    pub fn new(
        sessions: Arc<SessionStore>,
        telemetry: TelemetrySidecar,
        booking: Arc<dyn BookingApi>,
        profiles: Arc<dyn ProfileSource>,
        extractor: Arc<dyn FieldExtractor>,
        default_timezone: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            telemetry,
            booking,
            profiles,
            extractor,
            locks: CallLocks::new(),
            default_timezone: default_timezone.into(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Runs one turn under the call's lock. A panic anywhere in the turn is
    /// converted into [`TurnFault`] after a best-effort error transcript.
    pub async fn handle_turn(&self, input: TurnInput) -> Result<TurnOutput, TurnFault> {
        let call_id = input.call_id.clone();
        let _guard = self.locks.lock(&call_id).await;
        let turn_index = self.sessions.turns().next(&call_id);

        match AssertUnwindSafe(self.run(input, turn_index))
            .catch_unwind()
            .await
        {
            Ok(output) => Ok(output),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(call_id = %call_id, turn_index, error = %message, "Turn pipeline failed");
                self.telemetry.transcript(TranscriptEvent::new(
                    &call_id,
                    TurnRole::Error,
                    turn_index,
                    message.clone(),
                ));
                Err(TurnFault::Panicked(message))
            }
        }
    }

    async fn run(&self, input: TurnInput, turn_index: u64) -> TurnOutput {
        let TurnInput {
            business_id,
            call_id,
            text,
            caller_phone,
        } = input;

        self.telemetry.transcript(TranscriptEvent::new(
            &call_id,
            TurnRole::User,
            turn_index,
            text.clone(),
        ));

        let profile = load_or_fallback(self.profiles.as_ref(), &business_id).await;
        let existing = self.sessions.get(&call_id).unwrap_or_default();
        let ctx = ResolveContext {
            business_id: &business_id,
            profile: &profile,
            default_timezone: &self.default_timezone,
        };

        let extraction_context = ExtractionContext {
            service_names: profile.service_names().iter().map(|s| s.to_string()).collect(),
            timezone: ctx.timezone_for(&existing),
            today: today(),
        };
        let fields = extract_or_unknown(self.extractor.as_ref(), &text, &extraction_context).await;
        debug!(call_id = %call_id, intent = ?fields.intent, "Extracted turn fields");

        let mut patch = fields.to_patch();
        if patch.phone.is_none() && existing.phone.is_none() {
            patch.phone = caller_phone;
        }
        let session = self.sessions.merge(&call_id, patch);

        let reply = self
            .decide(&call_id, turn_index, &session, fields.intent, &ctx)
            .await;

        let state = if reply.clear_session {
            info!(call_id = %call_id, "Booking confirmed, clearing session");
            self.sessions.clear(&call_id);
            CallSession::default()
        } else {
            match reply.step {
                Some(step) => self.sessions.merge(&call_id, SessionPatch::with_step(step)),
                None => session,
            }
        };

        self.telemetry.transcript(TranscriptEvent::new(
            &call_id,
            TurnRole::Assistant,
            turn_index,
            reply.text.clone(),
        ));

        TurnOutput {
            reply: reply.text,
            state,
        }
    }

    async fn decide(
        &self,
        call_id: &str,
        turn_index: u64,
        session: &CallSession,
        intent: super::Intent,
        ctx: &ResolveContext<'_>,
    ) -> Reply {
        let availability_request = match resolve(session, intent, ctx) {
            Decision::Reply(reply) => return reply,
            Decision::CheckAvailability(request) => request,
        };

        let availability = self.booking.check_availability(&availability_request).await;
        let availability = self.record_tool(
            call_id,
            turn_index,
            CHECK_AVAILABILITY_TOOL,
            0,
            json!(availability_request),
            availability,
        );

        let booking_request = match after_availability(session, &availability, ctx) {
            AfterAvailability::Reply(reply) => return reply,
            AfterAvailability::Book(request) => request,
        };

        let booking = self.booking.book_appointment(&booking_request).await;
        let booking = self.record_tool(
            call_id,
            turn_index,
            BOOK_APPOINTMENT_TOOL,
            1,
            json!(booking_request),
            booking,
        );

        after_booking(session, &booking)
    }

    /// Emits the tool event and flattens transport errors into `null`, which
    /// the resolver treats as a failed call.
    fn record_tool<E: std::fmt::Display>(
        &self,
        call_id: &str,
        turn_index: u64,
        tool_name: &str,
        ordinal: u32,
        input: Value,
        result: Result<Value, E>,
    ) -> Value {
        let (output, value) = match result {
            Ok(value) => (value.clone(), value),
            Err(e) => {
                warn!(call_id = %call_id, tool = tool_name, error = %e, "Tool call failed");
                (json!({"ok": false, "error": e.to_string()}), Value::Null)
            }
        };
        self.telemetry.tool(ToolEvent::new(
            call_id, turn_index, tool_name, ordinal, input, output,
        ));
        value
    }
}

fn today() -> String {
    iso_date(time::OffsetDateTime::now_utc().date())
}

fn iso_date(date: time::Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}
