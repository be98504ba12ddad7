//! Lenient interpretation of scheduling backend responses.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvailabilityOutcome {
    Available,
    /// Reported unavailable, or the response could not be understood.
    Unavailable { error: Option<String> },
}

impl AvailabilityOutcome {
    /// Only an object with `available: true` counts as available.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) if map.get("available") == Some(&Value::Bool(true)) => {
                AvailabilityOutcome::Available
            }
            Value::Object(_) => AvailabilityOutcome::Unavailable {
                error: error_message(value),
            },
            _ => AvailabilityOutcome::Unavailable { error: None },
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityOutcome::Available)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked,
    Failed { error: Option<String> },
}

impl BookingOutcome {
    /// Only an object with `ok: true` counts as booked.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) if map.get("ok") == Some(&Value::Bool(true)) => BookingOutcome::Booked,
            _ => BookingOutcome::Failed {
                error: error_message(value),
            },
        }
    }
}

/// Extracts `error` as either a string or `{ "message": ... }`.
pub fn error_message(value: &Value) -> Option<String> {
    let error = value.get("error")?;
    let message = match error {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("message").and_then(Value::as_str)?,
        _ => return None,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_string())
}
