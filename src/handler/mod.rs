use crate::dialogue::TransferStatus;
use serde::{Deserialize, Serialize};

pub mod handler;
#[cfg(test)]
mod tests;
pub use handler::router;

/// Fields common to every provider webhook. Anything else in the form is
/// ignored.
#[derive(Debug, Deserialize)]
pub struct VoiceWebhook {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
}

#[derive(Debug, Deserialize)]
pub struct GatherWebhook {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "SpeechResult")]
    pub speech_result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferWebhook {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "DialCallStatus")]
    pub dial_call_status: Option<TransferStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusWebhook {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
}

impl StatusWebhook {
    /// The provider will send nothing more for this call.
    pub fn is_final(&self) -> bool {
        matches!(
            self.call_status.as_deref(),
            Some("completed" | "busy" | "failed" | "no-answer" | "canceled")
        )
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OutboundCallRequest {
    pub to: String,
}
