use std::collections::{HashMap, VecDeque};

/// Lifecycle of a call's bridge. There is no way back from `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgePhase {
    /// Model socket not yet open
    #[default]
    Connecting,
    Active,
    Closed,
}

/// Playback bookkeeping for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioSessionState {
    pub stream_id: Option<String>,
    pub latest_media_timestamp_ms: u64,
    pub response_start_timestamp_ms: Option<u64>,
    pub last_assistant_item_id: Option<String>,
    pub playback_mark_queue: VecDeque<String>,
    /// Tool calls awaiting output, keyed by tool-call id.
    pub pending_tool_calls: HashMap<String, PendingToolCall>,
    marks_sent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToolCall {
    pub name: String,
    pub response_id: String,
}

impl AudioSessionState {
    /// Bind a new stream and drop timestamps left over from any earlier one.
    pub fn bind_stream(&mut self, stream_id: String) {
        self.stream_id = Some(stream_id);
        self.response_start_timestamp_ms = None;
        self.latest_media_timestamp_ms = 0;
    }

    /// Enqueue a playback mark and return its name.
    pub fn push_mark(&mut self) -> String {
        let name = format!("chunk-{}", self.marks_sent);
        self.marks_sent += 1;
        self.playback_mark_queue.push_back(name.clone());
        name
    }

    pub fn ack_mark(&mut self) -> Option<String> {
        self.playback_mark_queue.pop_front()
    }

    /// True while assistant audio has been sent but not fully acknowledged.
    pub fn is_playing(&self) -> bool {
        !self.playback_mark_queue.is_empty() && self.response_start_timestamp_ms.is_some()
    }

    /// Milliseconds of the current utterance heard so far.
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.response_start_timestamp_ms
            .map(|start| self.latest_media_timestamp_ms.saturating_sub(start))
    }

    pub fn reset_playback(&mut self) {
        self.playback_mark_queue.clear();
        self.last_assistant_item_id = None;
        self.response_start_timestamp_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_stream_resets_timestamps() {
        let mut state = AudioSessionState {
            latest_media_timestamp_ms: 9_000,
            response_start_timestamp_ms: Some(8_000),
            ..Default::default()
        };
        state.bind_stream("MZ2".into());
        assert_eq!(state.stream_id.as_deref(), Some("MZ2"));
        assert_eq!(state.latest_media_timestamp_ms, 0);
        assert!(state.response_start_timestamp_ms.is_none());
    }

    #[test]
    fn test_marks_are_fifo_and_unique() {
        let mut state = AudioSessionState::default();
        let a = state.push_mark();
        let b = state.push_mark();
        assert_ne!(a, b);
        assert_eq!(state.ack_mark(), Some(a));
        assert_eq!(state.ack_mark(), Some(b));
        assert_eq!(state.ack_mark(), None);
    }

    #[test]
    fn test_elapsed_never_underflows() {
        let state = AudioSessionState {
            latest_media_timestamp_ms: 100,
            response_start_timestamp_ms: Some(400),
            ..Default::default()
        };
        assert_eq!(state.elapsed_ms(), Some(0));
    }
}
