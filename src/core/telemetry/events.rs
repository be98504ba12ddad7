//! Payloads posted to the telemetry collector.

use serde::Serialize;

use crate::core::idempotency::{TurnRole, event_id, tool_event_id};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    pub turn_id: String,
    pub call_id: String,
    pub role: String,
    pub text: String,
    pub turn_index: u64,
    pub timestamp: i64,
}

impl TranscriptEvent {
    pub fn new(call_id: &str, role: TurnRole, turn_index: u64, text: impl Into<String>) -> Self {
        Self {
            turn_id: event_id(call_id, role, turn_index),
            call_id: call_id.to_string(),
            role: role.as_str().to_string(),
            text: text.into(),
            turn_index,
            timestamp: now_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEvent {
    pub event_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub tool_index: u32,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    pub timestamp: i64,
}

impl ToolEvent {
    pub fn new(
        call_id: &str,
        turn_index: u64,
        tool_name: &str,
        tool_index: u32,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Self {
        Self {
            event_id: tool_event_id(call_id, turn_index, tool_name, tool_index),
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            tool_index,
            input,
            output,
            timestamp: now_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub call_id: String,
    pub llm_tokens: u64,
    pub tts_characters: u64,
    pub timestamp: i64,
}

impl UsageEvent {
    pub fn new(call_id: &str, llm_tokens: u64, tts_characters: u64) -> Self {
        Self {
            call_id: call_id.to_string(),
            llm_tokens,
            tts_characters,
            timestamp: now_millis(),
        }
    }
}
