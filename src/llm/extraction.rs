use super::LlmClient;
use crate::dialogue::prompts;
use crate::session::SessionSnapshot;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const EXTRACTION_PROMPT: &str = "\
You are the receptionist on a phone line, booking appointments. \
Collect exactly two things from the caller: their name and their preferred appointment day and time. \
You receive the caller's latest words and the fields already known; never ask again for a known field. \
Keep the reply short and conversational, it will be spoken aloud. \
Respond ONLY with a JSON object of this shape and nothing else: \
{\"reply\": \"<what to say to the caller>\", \
\"fields\": {\"name\": <string or null>, \"preferredTime\": <string or null>}}. \
Use null for anything the caller has not clearly said. Never guess.";

/// Outcome of one extraction call. Not stored; merged into the session by
/// the dialogue policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub utterance: String,
    pub name: Option<String>,
    pub preferred_time: Option<String>,
}

impl ExtractionResult {
    pub fn fallback() -> Self {
        Self {
            utterance: prompts::EXTRACTION_FALLBACK.to_string(),
            name: None,
            preferred_time: None,
        }
    }
}

/// Turns a caller utterance into a reply and any fields it mentions.
/// Implementations never fail: problems become [`ExtractionResult::fallback`].
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, utterance: &str, snapshot: &SessionSnapshot) -> ExtractionResult;
}

pub struct LlmExtractor {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn build_input(utterance: &str, snapshot: &SessionSnapshot) -> String {
        json!({
            "callerSaid": utterance,
            "known": snapshot,
        })
        .to_string()
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, utterance: &str, snapshot: &SessionSnapshot) -> ExtractionResult {
        let input = Self::build_input(utterance, snapshot);
        let start_time = Instant::now();

        let text = match tokio::time::timeout(
            self.timeout,
            self.client.generate_response(EXTRACTION_PROMPT, &input),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("extraction request failed: {}", e);
                return ExtractionResult::fallback();
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "extraction request timed out"
                );
                return ExtractionResult::fallback();
            }
        };

        debug!(
            elapsed = start_time.elapsed().as_millis() as u64,
            "extraction reply: {}", text
        );
        parse_reply(&text).unwrap_or_else(|| {
            warn!("unusable extraction reply: {:?}", text);
            ExtractionResult::fallback()
        })
    }
}

/// Locate the JSON envelope inside free text and validate it.
///
/// The envelope is whatever lies between the first `{` and the last `}`.
/// It must be an object with a non-empty string `reply`; `fields` is
/// optional and only non-empty string `name` / `preferredTime` are taken
/// from it.
pub fn parse_reply(text: &str) -> Option<ExtractionResult> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;
    let envelope = value.as_object()?;

    let reply = envelope.get("reply")?.as_str()?.trim();
    if reply.is_empty() {
        return None;
    }

    let fields = envelope.get("fields").and_then(Value::as_object);
    let field = |key: &str| {
        fields
            .and_then(|f| f.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Some(ExtractionResult {
        utterance: reply.to_string(),
        name: field("name"),
        preferred_time: field("preferredTime"),
    })
}
