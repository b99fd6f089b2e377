
use crate::app::{AppState, AppStateBuilder};
use crate::config::Config;
use crate::llm::{ExtractionResult, Extractor};
use crate::session::SessionSnapshot;
use crate::telephony::TelephonyClient;
use anyhow::Result;
use async_trait::async_trait;
use axum::response::Response;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub(super) struct QueuedExtractor {
    replies: Mutex<VecDeque<ExtractionResult>>,
}

impl QueuedExtractor {
    pub(super) fn new(replies: Vec<ExtractionResult>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait]
impl Extractor for QueuedExtractor {
    async fn extract(&self, _utterance: &str, _snapshot: &SessionSnapshot) -> ExtractionResult {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ExtractionResult::fallback)
    }
}

#[derive(Default)]
pub(super) struct RecordingTelephony {
    pub(super) placed: Mutex<Vec<(String, String, String)>>,
    pub(super) fail: bool,
}

#[async_trait]
impl TelephonyClient for RecordingTelephony {
    async fn place_call(&self, to: &str, answer_url: &str, status_url: &str) -> Result<String> {
        if self.fail {
            return Err(anyhow::anyhow!("provider unavailable"));
        }
        self.placed.lock().unwrap().push((
            to.to_string(),
            answer_url.to_string(),
            status_url.to_string(),
        ));
        Ok("CA-outbound-1".to_string())
    }
}

pub(super) fn test_config(transfer_number: Option<&str>) -> Config {
    let mut config = Config::default();
    config.http_addr = "127.0.0.1:0".to_string();
    config.public_base_url = "https://calls.example.com".to_string();
    config.transfer_number = transfer_number.map(str::to_string);
    config
}

pub(super) async fn build_state(
    config: Config,
    replies: Vec<ExtractionResult>,
    telephony: Arc<RecordingTelephony>,
) -> AppState {
    AppStateBuilder::new()
        .config(config)
        .extractor(QueuedExtractor::new(replies))
        .telephony(telephony)
        .build()
        .await
        .expect("Failed to build app state")
}

// Helper function to convert axum response to a string body
pub(super) async fn response_to_string(response: Response) -> String {
    let body = response.into_body();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
