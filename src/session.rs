use crate::dialogue::{Decision, NextAction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[cfg(test)]
mod tests;

/// Where a call currently is in its lifecycle.
///
/// ```text
/// Initiated ─┬─→ Transferring ─┬─→ Ended            (human answered)
///            │                 └─→ Gathering
///            └─→ Gathering ─┬─→ Booked ───→ Ended
///                           └─→ Exhausted ─→ Ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Initiated,
    Transferring,
    Gathering,
    Booked,
    Exhausted,
    Ended,
}

impl CallState {
    /// No further dialogue happens in these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Booked | CallState::Exhausted | CallState::Ended
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Initiated => write!(f, "initiated"),
            CallState::Transferring => write!(f, "transferring"),
            CallState::Gathering => write!(f, "gathering"),
            CallState::Booked => write!(f, "booked"),
            CallState::Exhausted => write!(f, "exhausted"),
            CallState::Ended => write!(f, "ended"),
        }
    }
}

/// Per-call dialogue state.
#[derive(Debug, Clone, Serialize)]
pub struct CallSession {
    pub call_id: String,
    pub state: CallState,
    pub turn_count: u32,
    pub silent_turns: u32,
    pub name: Option<String>,
    pub preferred_time: Option<String>,
    pub booked: bool,
    pub transfer_attempted: bool,
    pub created_at: DateTime<Utc>,
}

/// Read-only view of the captured fields, handed to the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub name: Option<String>,
    pub preferred_time: Option<String>,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            state: CallState::Initiated,
            turn_count: 0,
            silent_turns: 0,
            name: None,
            preferred_time: None,
            booked: false,
            transfer_attempted: false,
            created_at: Utc::now(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            name: self.name.clone(),
            preferred_time: self.preferred_time.clone(),
        }
    }

    pub fn has_both_fields(&self) -> bool {
        self.name.is_some() && self.preferred_time.is_some()
    }

    /// Record a value for a field only if it has never been set.
    fn capture(slot: &mut Option<String>, value: Option<&String>) {
        if slot.is_none() {
            if let Some(v) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
                *slot = Some(v.to_string());
            }
        }
    }

    /// Apply the mutations a dialogue decision asks for.
    pub fn apply(&mut self, decision: &Decision) {
        if decision.count_turn {
            self.turn_count += 1;
            self.silent_turns = 0;
        }
        if decision.count_silence {
            self.silent_turns += 1;
        }
        if matches!(decision.next, NextAction::Transfer { .. }) {
            self.transfer_attempted = true;
        }
        Self::capture(&mut self.name, decision.captured.name.as_ref());
        Self::capture(
            &mut self.preferred_time,
            decision.captured.preferred_time.as_ref(),
        );
        if decision.mark_booked && self.has_both_fields() {
            self.booked = true;
        }
        self.state = decision.state;
    }
}

pub type SessionRef = Arc<tokio::sync::Mutex<CallSession>>;

struct SessionEntry {
    session: SessionRef,
    touched: Instant,
}

/// Process-wide map of live calls.
///
/// Each session sits behind its own async mutex so a call has a single
/// writer, while different calls never contend beyond the brief map lock.
/// The map is bounded: idle entries expire and, when still full, the least
/// recently touched call is evicted to make room.
pub struct SessionStore {
    inner: Mutex<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            idle_timeout,
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_or_create(&self, call_id: &str) -> SessionRef {
        let mut entries = self.entries();
        let now = Instant::now();
        if let Some(entry) = entries.get_mut(call_id) {
            entry.touched = now;
            return entry.session.clone();
        }

        if entries.len() >= self.max_sessions {
            let idle_timeout = self.idle_timeout;
            entries.retain(|_, entry| now.duration_since(entry.touched) < idle_timeout);
        }
        if entries.len() >= self.max_sessions {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                warn!(call_id = %oldest, "session store full, evicting oldest call");
                entries.remove(&oldest);
            }
        }

        debug!(call_id, "session created");
        let session = Arc::new(tokio::sync::Mutex::new(CallSession::new(call_id)));
        entries.insert(
            call_id.to_string(),
            SessionEntry {
                session: session.clone(),
                touched: now,
            },
        );
        session
    }

    pub fn get(&self, call_id: &str) -> Option<SessionRef> {
        let mut entries = self.entries();
        entries.get_mut(call_id).map(|entry| {
            entry.touched = Instant::now();
            entry.session.clone()
        })
    }

    pub fn remove(&self, call_id: &str) -> Option<SessionRef> {
        let removed = self.entries().remove(call_id).map(|entry| entry.session);
        if removed.is_some() {
            debug!(call_id, "session removed");
        }
        removed
    }

    /// Drop every session idle for longer than the configured timeout.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let idle_timeout = self.idle_timeout;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.touched) < idle_timeout);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every idle session, newest first. A session locked by a
    /// turn in progress is skipped rather than waited on.
    pub fn list(&self) -> Vec<CallSession> {
        let sessions: Vec<SessionRef> = self
            .entries()
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        let mut calls: Vec<CallSession> = sessions
            .iter()
            .filter_map(|session| session.try_lock().ok().map(|s| s.clone()))
            .collect();
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        calls
    }
}
