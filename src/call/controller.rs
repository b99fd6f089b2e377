use super::{Booking, BookingSink, LogBookingSink};
use crate::config::Config;
use crate::dialogue::{self, prompts, CallResponse, Decision, TransferStatus, TurnLimits};
use crate::llm::Extractor;
use crate::session::{CallSession, CallState, SessionStore};
use anyhow::{ensure, Result};
use chrono::Utc;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub limits: TurnLimits,
    pub transfer_target: Option<String>,
    pub ring_timeout_secs: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            limits: TurnLimits::default(),
            transfer_target: None,
            ring_timeout_secs: 20,
        }
    }
}

impl ControllerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limits: TurnLimits {
                turn_budget: config.turn_budget,
                max_silent_turns: config.max_silent_turns,
            },
            transfer_target: config.transfer_target().map(str::to_string),
            ring_timeout_secs: config.transfer_timeout_secs,
        }
    }
}

/// Drives one webhook turn at a time for any number of concurrent calls.
pub struct CallController {
    sessions: Arc<SessionStore>,
    extractor: Arc<dyn Extractor>,
    bookings: Arc<dyn BookingSink>,
    settings: ControllerSettings,
}

impl CallController {
    pub fn new(
        sessions: Arc<SessionStore>,
        extractor: Arc<dyn Extractor>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            sessions,
            extractor,
            bookings: Arc::new(LogBookingSink),
            settings,
        }
    }

    /// Replace the default log-only booking sink.
    pub fn with_bookings(mut self, bookings: Arc<dyn BookingSink>) -> Self {
        self.bookings = bookings;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// First contact: try the human line if one is configured, otherwise
    /// start gathering.
    pub async fn on_incoming(&self, call_id: &str) -> CallResponse {
        self.guarded(call_id, "incoming", self.incoming(call_id))
            .await
    }

    /// Outcome of the human transfer leg.
    pub async fn on_transfer_status(&self, call_id: &str, status: TransferStatus) -> CallResponse {
        self.guarded(
            call_id,
            "transfer_status",
            self.transfer_status(call_id, status),
        )
        .await
    }

    /// One caller utterance. `speech` is `None` or blank when nothing was
    /// transcribed.
    pub async fn on_speech(&self, call_id: &str, speech: Option<&str>) -> CallResponse {
        self.guarded(call_id, "speech", self.speech(call_id, speech))
            .await
    }

    /// The provider reports the call is over; forget it.
    pub fn on_call_ended(&self, call_id: &str) {
        if self.sessions.remove(call_id).is_some() {
            info!(call_id, "call ended by provider");
        }
    }

    async fn incoming(&self, call_id: &str) -> Result<CallResponse> {
        ensure!(!call_id.trim().is_empty(), "missing call id");
        let session = self.sessions.get_or_create(call_id);
        let mut session = session.lock().await;

        let decision = if session.state.is_terminal() {
            dialogue::decide(&session, None, &self.settings.limits)
        } else {
            match self.settings.transfer_target.as_deref() {
                Some(target) if !session.transfer_attempted => {
                    dialogue::transfer(target, self.settings.ring_timeout_secs)
                }
                _ => dialogue::greet(&session),
            }
        };
        self.commit(&mut session, decision).await
    }

    async fn transfer_status(&self, call_id: &str, status: TransferStatus) -> Result<CallResponse> {
        ensure!(!call_id.trim().is_empty(), "missing call id");
        let session = self.sessions.get_or_create(call_id);
        let mut session = session.lock().await;

        if session.state != CallState::Transferring {
            warn!(
                call_id,
                state = %session.state,
                %status,
                "transfer outcome for a call that is not transferring"
            );
        }
        let decision = if session.state.is_terminal() {
            dialogue::decide(&session, None, &self.settings.limits)
        } else {
            dialogue::transfer_outcome(&session, status)
        };
        info!(call_id, %status, "transfer finished");
        self.commit(&mut session, decision).await
    }

    async fn speech(&self, call_id: &str, speech: Option<&str>) -> Result<CallResponse> {
        ensure!(!call_id.trim().is_empty(), "missing call id");
        let session = self.sessions.get_or_create(call_id);
        let mut session = session.lock().await;

        let limits = &self.settings.limits;
        let speech = speech.map(str::trim).filter(|s| !s.is_empty());
        let open = !session.state.is_terminal()
            && !session.booked
            && !dialogue::budget_exhausted(&session, limits);

        let extraction = match speech {
            Some(text) if open => Some(self.extractor.extract(text, &session.snapshot()).await),
            _ => None,
        };
        let decision = dialogue::decide(&session, extraction.as_ref(), limits);
        self.commit(&mut session, decision).await
    }

    async fn commit(&self, session: &mut CallSession, decision: Decision) -> Result<CallResponse> {
        ensure!(
            !decision.speak.is_empty(),
            "dialogue produced nothing to say"
        );
        let previous = session.state;
        let was_booked = session.booked;
        session.apply(&decision);
        if session.booked && !was_booked {
            self.record_booking(session).await;
        }
        info!(
            call_id = %session.call_id,
            from = %previous,
            state = %session.state,
            turn = session.turn_count,
            booked = session.booked,
            "call turn"
        );

        let response = decision.response();
        if response.is_hangup() {
            self.sessions.remove(&session.call_id);
        }
        Ok(response)
    }

    async fn record_booking(&self, session: &CallSession) {
        let (Some(name), Some(preferred_time)) = (&session.name, &session.preferred_time) else {
            return;
        };
        let booking = Booking {
            call_id: session.call_id.clone(),
            name: name.clone(),
            preferred_time: preferred_time.clone(),
            booked_at: Utc::now(),
        };
        // the caller has already been told they are booked
        if let Err(e) = self.bookings.record(&booking).await {
            error!(call_id = %booking.call_id, "failed to record booking: {}", e);
        }
    }

    async fn guarded<F>(&self, call_id: &str, stage: &str, turn: F) -> CallResponse
    where
        F: Future<Output = Result<CallResponse>>,
    {
        match AssertUnwindSafe(turn).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(call_id, stage, "call turn failed: {}", e);
                self.sessions.remove(call_id);
                CallResponse::hangup(prompts::APOLOGY)
            }
            Err(_) => {
                error!(call_id, stage, "call turn panicked");
                self.sessions.remove(call_id);
                CallResponse::hangup(prompts::APOLOGY)
            }
        }
    }
}
