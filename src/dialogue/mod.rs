//! Dialogue policy.
//!
//! Every function here is pure: it looks at a [`CallSession`] (and, for a
//! speech turn, the extraction result) and returns a [`Decision`] describing
//! what to say, what to do next and which session mutations to apply. The
//! caller applies the decision with [`CallSession::apply`].
//!
//! Rules for a speech turn, in order:
//!
//! 1. a session already booked, exhausted or ended is closed again;
//! 2. `turn_count >= turn_budget` ends the call, whatever was collected;
//! 3. an empty utterance re-prompts without spending a turn (until the
//!    silence cap is hit);
//! 4. extracted fields are merged first-write-wins;
//! 5. both fields present for the first time books the call and hangs up;
//! 6. otherwise ask for whatever is still missing and listen again.

use crate::llm::ExtractionResult;
use crate::session::{CallSession, CallState};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod prompts;

/// What the call does after the spoken lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextAction {
    Listen,
    Transfer { target: String, ring_timeout_secs: u64 },
    Hangup,
}

/// Abstract response handed to the markup renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallResponse {
    pub speak: Vec<String>,
    pub next: NextAction,
}

impl CallResponse {
    pub fn hangup(line: impl Into<String>) -> Self {
        Self {
            speak: vec![line.into()],
            next: NextAction::Hangup,
        }
    }

    pub fn is_hangup(&self) -> bool {
        self.next == NextAction::Hangup
    }
}

/// Terminal status reported by the transfer-outcome callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferStatus {
    Completed,
    Answered,
    Busy,
    NoAnswer,
    Canceled,
    #[serde(other)]
    Failed,
}

impl TransferStatus {
    pub fn is_answered(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Answered)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStatus::Completed => write!(f, "completed"),
            TransferStatus::Answered => write!(f, "answered"),
            TransferStatus::Busy => write!(f, "busy"),
            TransferStatus::NoAnswer => write!(f, "no-answer"),
            TransferStatus::Canceled => write!(f, "canceled"),
            TransferStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnLimits {
    pub turn_budget: u32,
    pub max_silent_turns: u32,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            turn_budget: 6,
            max_silent_turns: 3,
        }
    }
}

/// Field values a decision newly captures. Already-set fields are never
/// repeated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub name: Option<String>,
    pub preferred_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub speak: Vec<String>,
    pub next: NextAction,
    pub state: CallState,
    pub captured: Captured,
    pub mark_booked: bool,
    pub count_turn: bool,
    pub count_silence: bool,
}

impl Decision {
    fn new(speak: Vec<String>, next: NextAction, state: CallState) -> Self {
        Self {
            speak,
            next,
            state,
            captured: Captured::default(),
            mark_booked: false,
            count_turn: false,
            count_silence: false,
        }
    }

    pub fn response(&self) -> CallResponse {
        CallResponse {
            speak: self.speak.clone(),
            next: self.next.clone(),
        }
    }
}

pub fn budget_exhausted(session: &CallSession, limits: &TurnLimits) -> bool {
    session.turn_count >= limits.turn_budget
}

/// Prompt for whichever fields are still unknown.
pub fn next_prompt(name: Option<&str>, preferred_time: Option<&str>) -> &'static str {
    match (name, preferred_time) {
        (None, None) => prompts::ASK_BOTH,
        (None, Some(_)) => prompts::ASK_NAME,
        (Some(_), None) => prompts::ASK_TIME,
        (Some(_), Some(_)) => prompts::ONE_MOMENT,
    }
}

/// First contact with no transfer: greet and ask for both fields.
pub fn greet(session: &CallSession) -> Decision {
    let prompt = next_prompt(session.name.as_deref(), session.preferred_time.as_deref());
    Decision::new(
        vec![prompts::GREETING.to_string(), prompt.to_string()],
        NextAction::Listen,
        CallState::Gathering,
    )
}

/// First contact with a human destination configured.
pub fn transfer(target: &str, ring_timeout_secs: u64) -> Decision {
    Decision::new(
        vec![prompts::CONNECTING.to_string()],
        NextAction::Transfer {
            target: target.to_string(),
            ring_timeout_secs,
        },
        CallState::Transferring,
    )
}

/// The human leg finished: either the call is done, or we take over.
pub fn transfer_outcome(session: &CallSession, status: TransferStatus) -> Decision {
    if status.is_answered() {
        return Decision::new(
            vec![prompts::GOODBYE.to_string()],
            NextAction::Hangup,
            CallState::Ended,
        );
    }
    let prompt = next_prompt(session.name.as_deref(), session.preferred_time.as_deref());
    Decision::new(
        vec![prompts::TEAM_BUSY.to_string(), prompt.to_string()],
        NextAction::Listen,
        CallState::Gathering,
    )
}

/// Re-close a call that has already reached a terminal state.
fn closing(session: &CallSession) -> Decision {
    let line = match session.state {
        CallState::Booked => prompts::BOOKED,
        CallState::Exhausted => prompts::EXHAUSTED,
        _ => prompts::GOODBYE,
    };
    Decision::new(vec![line.to_string()], NextAction::Hangup, session.state)
}

fn exhausted() -> Decision {
    Decision::new(
        vec![prompts::EXHAUSTED.to_string()],
        NextAction::Hangup,
        CallState::Exhausted,
    )
}

/// Decide one speech turn. `extraction` is `None` when nothing was
/// transcribed; callers must not run extraction when
/// [`budget_exhausted`] is already true.
pub fn decide(
    session: &CallSession,
    extraction: Option<&ExtractionResult>,
    limits: &TurnLimits,
) -> Decision {
    if session.state.is_terminal() || session.booked {
        return closing(session);
    }
    if budget_exhausted(session, limits) {
        return exhausted();
    }

    let result = match extraction {
        Some(result) => result,
        None if session.silent_turns >= limits.max_silent_turns => return exhausted(),
        None => {
            let mut decision = Decision::new(
                vec![prompts::REPEAT.to_string()],
                NextAction::Listen,
                CallState::Gathering,
            );
            decision.count_silence = true;
            return decision;
        }
    };

    let captured = Captured {
        name: session
            .name
            .is_none()
            .then(|| non_empty(result.name.as_deref()))
            .flatten(),
        preferred_time: session
            .preferred_time
            .is_none()
            .then(|| non_empty(result.preferred_time.as_deref()))
            .flatten(),
    };
    let name = session.name.as_deref().or(captured.name.as_deref());
    let preferred_time = session
        .preferred_time
        .as_deref()
        .or(captured.preferred_time.as_deref());

    let mut speak = Vec::with_capacity(2);
    if let Some(reply) = non_empty(Some(result.utterance.as_str())) {
        speak.push(reply);
    }

    let mut decision = if name.is_some() && preferred_time.is_some() {
        speak.push(prompts::BOOKED.to_string());
        let mut decision = Decision::new(speak, NextAction::Hangup, CallState::Booked);
        decision.mark_booked = true;
        decision
    } else {
        speak.push(next_prompt(name, preferred_time).to_string());
        Decision::new(speak, NextAction::Listen, CallState::Gathering)
    };
    decision.captured = captured;
    decision.count_turn = true;
    decision
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
