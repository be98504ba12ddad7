//! Deterministic identifiers for telemetry events.
//!
//! The collector deduplicates on these identifiers, so a retried emission of the
//! same event must produce exactly the same string.

use dashmap::DashMap;

/// Conversation participant an event is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnRole {
    User,
    Assistant,
    Error,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::Error => "error",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic per-call turn counter. Counters are only reset by a process restart.
#[derive(Debug, Default)]
pub struct TurnCounter {
    counters: DashMap<String, u64>,
}

impl TurnCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the call's current turn index and advances it. Unknown calls start at 0.
    pub fn next(&self, call_id: &str) -> u64 {
        let mut counter = self.counters.entry(call_id.to_string()).or_insert(0);
        let current = *counter;
        *counter += 1;
        current
    }

    /// Index the next call to [`TurnCounter::next`] would return, without advancing.
    pub fn peek(&self, call_id: &str) -> u64 {
        self.counters.get(call_id).map(|c| *c).unwrap_or(0)
    }
}

/// `"{callId}:{role}:{turnIndex}"`
pub fn event_id(call_id: &str, role: TurnRole, turn_index: u64) -> String {
    format!("{call_id}:{role}:{turn_index}")
}

/// `"{callId}:tool:{turnIndex}:{toolName}:{ordinal}"`
///
/// `ordinal` is the position of the invocation within its turn.
pub fn tool_event_id(call_id: &str, turn_index: u64, tool_name: &str, ordinal: u32) -> String {
    format!("{call_id}:tool:{turn_index}:{tool_name}:{ordinal}")
}
