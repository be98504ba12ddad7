//! Booking tools exposed to the realtime model.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::events::ToolCall;
use crate::core::booking::{AvailabilityRequest, BookingApi, BookingRequest, appointment_start};
use crate::core::business::{BusinessProfile, DEFAULT_SERVICE_MINUTES};
use crate::core::dialog::{BOOK_APPOINTMENT_TOOL, CHECK_AVAILABILITY_TOOL};
use crate::core::realtime::openai::ToolDef;

/// Tool definitions advertised in `session.update`.
pub fn tool_definitions() -> Vec<ToolDef> {
    vec![
        ToolDef::function(
            CHECK_AVAILABILITY_TOOL,
            "Check whether the business has an opening on a date.",
            json!({
                "type": "object",
                "properties": {
                    "date": {"type": "string", "description": "YYYY-MM-DD"},
                    "time": {"type": "string", "description": "HH:MM, 24-hour"},
                    "service": {"type": "string"},
                    "timezone": {"type": "string", "description": "IANA timezone"}
                },
                "required": ["date"]
            }),
        ),
        ToolDef::function(
            BOOK_APPOINTMENT_TOOL,
            "Book the appointment once check_availability reported it available.",
            json!({
                "type": "object",
                "properties": {
                    "date": {"type": "string", "description": "YYYY-MM-DD"},
                    "time": {"type": "string", "description": "HH:MM, 24-hour"},
                    "service": {"type": "string"},
                    "name": {"type": "string"},
                    "email": {"type": "string"},
                    "phone": {"type": "string"},
                    "timezone": {"type": "string"}
                },
                "required": ["date", "time", "name"]
            }),
        ),
    ]
}

/// What the bridge knows about the call when a tool runs.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub business_id: String,
    pub caller_phone: Option<String>,
    pub profile: Arc<BusinessProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ToolArguments {
    date: Option<String>,
    time: Option<String>,
    start: Option<String>,
    service: Option<String>,
    timezone: Option<String>,
    #[serde(alias = "guestName")]
    name: Option<String>,
    #[serde(alias = "guestEmail")]
    email: Option<String>,
    #[serde(alias = "guestPhone")]
    phone: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn failure(error: impl Into<String>) -> Value {
    json!({ "ok": false, "error": error.into() })
}

/// Runs model tool calls against the booking API. Every call yields an output
/// object, failures included, so the model is never left waiting.
#[derive(Clone)]
pub struct ToolExecutor {
    booking: Arc<dyn BookingApi>,
    default_timezone: String,
}

impl ToolExecutor {
    pub fn new(booking: Arc<dyn BookingApi>, default_timezone: impl Into<String>) -> Self {
        Self {
            booking,
            default_timezone: default_timezone.into(),
        }
    }

    /// Returns the parsed input (for telemetry) and the tool output.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> (Value, Value) {
        let input: Value = match serde_json::from_str(&call.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Unparseable tool arguments");
                return (Value::String(call.arguments.clone()), failure("invalid arguments"));
            }
        };
        let args: ToolArguments = serde_json::from_value(input.clone()).unwrap_or_default();

        let output = match call.name.as_str() {
            CHECK_AVAILABILITY_TOOL => self.check_availability(args, ctx).await,
            BOOK_APPOINTMENT_TOOL => self.book_appointment(args, ctx).await,
            other => {
                warn!(tool = %other, "Model requested an unknown tool");
                failure(format!("unknown tool: {other}"))
            }
        };
        debug!(tool = %call.name, output = %output, "Tool finished");
        (input, output)
    }

    fn timezone(&self, requested: Option<String>, ctx: &ToolContext) -> String {
        present(requested)
            .or_else(|| ctx.profile.timezone.clone())
            .unwrap_or_else(|| self.default_timezone.clone())
    }

    async fn check_availability(&self, args: ToolArguments, ctx: &ToolContext) -> Value {
        let Some(date) = present(args.date) else {
            return json!({ "available": false, "error": "date is required" });
        };
        let duration_minutes = present(args.service)
            .map(|s| ctx.profile.duration_for(&s))
            .unwrap_or(DEFAULT_SERVICE_MINUTES);

        let request = AvailabilityRequest {
            business_id: ctx.business_id.clone(),
            date,
            timezone: self.timezone(args.timezone, ctx),
            duration_minutes,
        };
        match self.booking.check_availability(&request).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Availability check failed");
                json!({ "available": false, "error": e.to_string() })
            }
        }
    }

    async fn book_appointment(&self, args: ToolArguments, ctx: &ToolContext) -> Value {
        let start = match (present(args.start), present(args.date), present(args.time)) {
            (Some(start), _, _) => start,
            (None, Some(date), Some(time)) => appointment_start(&date, &time),
            _ => return failure("date and time are required"),
        };
        let Some(guest_name) = present(args.name) else {
            return failure("name is required");
        };
        let guest_email = present(args.email);
        let guest_phone = present(args.phone).or_else(|| present(ctx.caller_phone.clone()));
        if guest_email.is_none() && guest_phone.is_none() {
            return failure("an email address or phone number is required");
        }

        let request = BookingRequest {
            business_id: ctx.business_id.clone(),
            start,
            timezone: self.timezone(args.timezone, ctx),
            service: present(args.service),
            guest_name,
            guest_email,
            guest_phone,
        };
        match self.booking.book_appointment(&request).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Booking failed");
                failure(e.to_string())
            }
        }
    }
}
