//! Keyed, TTL-expiring store of per-call dialogue state.
//!
//! Entries expire after `ttl` without a mutation. Expiry is checked lazily: an
//! expired entry stays in the backing map until the next read or merge for that
//! call identifier notices it, there is no background sweeper.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::model::{CallSession, SessionPatch};
use crate::core::idempotency::TurnCounter;

/// Default inactivity window after which a call's slots are forgotten.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
struct SessionEntry {
    session: CallSession,
    touched_at: Instant,
}

/// Per-call session arena.
///
/// Operations on different call identifiers never contend beyond the shard
/// locks of the underlying map.
pub struct SessionStore {
    entries: DashMap<String, SessionEntry>,
    turns: TurnCounter,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            turns: TurnCounter::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Turn counters live next to the sessions but are never expired or cleared.
    pub fn turns(&self) -> &TurnCounter {
        &self.turns
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.touched_at) > self.ttl
    }

    /// Returns the live session for `call_id`, evicting it if it has expired.
    pub fn get(&self, call_id: &str) -> Option<CallSession> {
        let now = self.clock.now();
        {
            let entry = self.entries.get(call_id)?;
            if !self.is_expired(&entry, now) {
                return Some(entry.session.clone());
            }
        }

        let evicted = self
            .entries
            .remove_if(call_id, |_, entry| self.is_expired(entry, now));
        if evicted.is_some() {
            debug!(call_id = %call_id, "Evicted expired session on read");
        }
        None
    }

    /// Applies `patch` to the call's session, creating a fresh one when the call
    /// is unknown or its previous session has expired.
    pub fn merge(&self, call_id: &str, patch: SessionPatch) -> CallSession {
        let now = self.clock.now();
        match self.entries.entry(call_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let expired = self.is_expired(occupied.get(), now);
                let entry = occupied.get_mut();
                if expired {
                    debug!(call_id = %call_id, "Session expired, starting fresh");
                    entry.session = CallSession::default();
                }
                entry.session.apply(patch);
                entry.touched_at = now;
                entry.session.clone()
            }
            Entry::Vacant(vacant) => {
                let mut session = CallSession::default();
                session.apply(patch);
                vacant.insert(SessionEntry {
                    session: session.clone(),
                    touched_at: now,
                });
                session
            }
        }
    }

    /// Forgets the call's slots. Clearing an unknown call is a no-op.
    pub fn clear(&self, call_id: &str) {
        self.entries.remove(call_id);
    }

    /// Number of entries in the backing map, expired ones included.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::clock::ManualClock;
    use crate::core::session::model::DialogStep;

    fn store_with_clock(ttl_secs: u64) -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let store = SessionStore::with_clock(Duration::from_secs(ttl_secs), clock.clone());
        (store, clock)
    }

    fn patch_service(name: &str) -> SessionPatch {
        SessionPatch {
            service: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_unknown_call_is_absent() {
        let (store, _) = store_with_clock(60);
        assert!(store.get("CA-unknown").is_none());
    }

    #[test]
    fn test_merge_creates_then_updates() {
        let (store, _) = store_with_clock(60);

        let first = store.merge("CA1", patch_service("Massage"));
        assert_eq!(first.service.as_deref(), Some("Massage"));
        assert!(first.date.is_none());

        let second = store.merge(
            "CA1",
            SessionPatch {
                date: Some("2025-06-01".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(second.service.as_deref(), Some("Massage"));
        assert_eq!(second.date.as_deref(), Some("2025-06-01"));
        assert_eq!(store.get("CA1"), Some(second));
    }

    #[test]
    fn test_sequence_of_merges_never_regresses_to_null() {
        let (store, _) = store_with_clock(60);
        store.merge(
            "CA1",
            SessionPatch {
                name: Some("Dana".to_string()),
                email: Some("dana@example.com".to_string()),
                ..Default::default()
            },
        );

        for patch in [
            SessionPatch::default(),
            SessionPatch::with_step(DialogStep::AskDatetime),
            SessionPatch {
                name: Some(String::new()),
                ..Default::default()
            },
        ] {
            let session = store.merge("CA1", patch);
            assert_eq!(session.name.as_deref(), Some("Dana"));
            assert_eq!(session.email.as_deref(), Some("dana@example.com"));
        }
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted_lazily() {
        let (store, clock) = store_with_clock(30 * 60);
        store.merge("CA1", patch_service("Facial"));

        clock.advance(Duration::from_secs(30 * 60 + 1));

        // Still physically present until something reads it
        assert_eq!(store.entry_count(), 1);
        assert!(store.get("CA1").is_none());
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_merge_refreshes_ttl() {
        let (store, clock) = store_with_clock(100);
        store.merge("CA1", patch_service("Facial"));

        clock.advance(Duration::from_secs(80));
        store.merge("CA1", SessionPatch::default());
        clock.advance(Duration::from_secs(80));

        assert!(store.get("CA1").is_some());
    }

    #[test]
    fn test_merge_after_expiry_starts_fresh() {
        let (store, clock) = store_with_clock(10);
        store.merge("CA1", patch_service("Facial"));
        clock.advance(Duration::from_secs(11));

        let session = store.merge(
            "CA1",
            SessionPatch {
                time: Some("09:00".to_string()),
                ..Default::default()
            },
        );
        assert!(session.service.is_none());
        assert_eq!(session.time.as_deref(), Some("09:00"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (store, _) = store_with_clock(60);
        store.merge("CA1", patch_service("Facial"));
        store.clear("CA1");
        store.clear("CA1");
        store.clear("never-seen");
        assert!(store.get("CA1").is_none());
    }

    #[test]
    fn test_calls_are_independent() {
        let (store, _) = store_with_clock(60);
        store.merge("CA1", patch_service("Facial"));
        store.merge("CA2", patch_service("Massage"));
        store.clear("CA1");
        assert_eq!(
            store.get("CA2").and_then(|s| s.service).as_deref(),
            Some("Massage")
        );
    }

    #[tokio::test]
    async fn test_concurrent_merges_on_distinct_keys() {
        let store = Arc::new(SessionStore::default());
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let call_id = format!("CA{i}");
                store.merge(&call_id, patch_service(&format!("svc-{i}")));
                store.get(&call_id)
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let session = handle.await.unwrap().unwrap();
            assert_eq!(session.service, Some(format!("svc-{i}")));
        }
    }
}
