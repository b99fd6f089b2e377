use super::*;
use crate::dialogue::prompts;
use crate::session::SessionSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use mockall::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mock! {
    pub Completion {}

    #[async_trait]
    impl LlmClient for Completion {
        async fn generate_response(&self, system_prompt: &str, input: &str) -> Result<String>;
    }
}

/// Answers only after `delay`, for exercising the extraction timeout.
struct SlowCompletion {
    delay: Duration,
}

#[async_trait]
impl LlmClient for SlowCompletion {
    async fn generate_response(&self, _system_prompt: &str, _input: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(r#"{"reply":"too late","fields":{"name":"Dana"}}"#.to_string())
    }
}

fn replying(text: &'static str) -> MockCompletion {
    let mut client = MockCompletion::new();
    client
        .expect_generate_response()
        .returning(move |_, _| Ok(text.to_string()));
    client
}

fn extractor(client: MockCompletion) -> LlmExtractor {
    LlmExtractor::new(Arc::new(client), Duration::from_millis(200))
}

#[test]
fn test_parse_bare_envelope() {
    let result = parse_reply(
        r#"{"reply":"Great, Dana, Tuesday at 3pm works","fields":{"name":"Dana","preferredTime":"Tuesday at 3pm"}}"#,
    )
    .unwrap();
    assert_eq!(result.utterance, "Great, Dana, Tuesday at 3pm works");
    assert_eq!(result.name.as_deref(), Some("Dana"));
    assert_eq!(result.preferred_time.as_deref(), Some("Tuesday at 3pm"));
}

#[test]
fn test_parse_envelope_inside_prose() {
    let text = "Sure! Here you go:\n```json\n{\"reply\": \"Thanks Dana. What time suits you?\", \"fields\": {\"name\": \"Dana\", \"preferredTime\": null}}\n```\nHope that helps.";
    let result = parse_reply(text).unwrap();
    assert_eq!(result.utterance, "Thanks Dana. What time suits you?");
    assert_eq!(result.name.as_deref(), Some("Dana"));
    assert_eq!(result.preferred_time, None);
}

#[test]
fn test_parse_tolerates_missing_or_malformed_fields() {
    let result = parse_reply(r#"{"reply":"Hello there"}"#).unwrap();
    assert_eq!(result.name, None);
    assert_eq!(result.preferred_time, None);

    let result = parse_reply(r#"{"reply":"Hello","fields":"Dana"}"#).unwrap();
    assert_eq!(result.name, None);

    let result =
        parse_reply(r#"{"reply":"Hello","fields":{"name":42,"preferredTime":"  ","extra":true},"mood":"happy"}"#)
            .unwrap();
    assert_eq!(result.name, None);
    assert_eq!(result.preferred_time, None);
}

#[test]
fn test_parse_rejects_unusable_text() {
    assert!(parse_reply("").is_none());
    assert!(parse_reply("I could not understand the caller").is_none());
    assert!(parse_reply("} backwards {").is_none());
    assert!(parse_reply("{not json at all}").is_none());
    assert!(parse_reply(r#"{"fields":{"name":"Dana"}}"#).is_none());
    assert!(parse_reply(r#"{"reply":"   "}"#).is_none());
    assert!(parse_reply(r#"{"reply":7}"#).is_none());
}

#[tokio::test]
async fn test_extract_success() {
    let extractor = extractor(replying(
        r#"{"reply":"Thanks, Dana.","fields":{"name":"Dana","preferredTime":null}}"#,
    ));
    let result = extractor
        .extract("It's Dana", &SessionSnapshot::default())
        .await;
    assert_eq!(result.utterance, "Thanks, Dana.");
    assert_eq!(result.name.as_deref(), Some("Dana"));
}

#[tokio::test]
async fn test_extract_sends_prompt_utterance_and_snapshot() {
    let captured = Arc::new(Mutex::new(None));
    let captured_clone = captured.clone();
    let mut client = MockCompletion::new();
    client
        .expect_generate_response()
        .times(1)
        .returning(move |system, input| {
            assert_eq!(system, EXTRACTION_PROMPT);
            *captured_clone.lock().unwrap() = Some(input.to_string());
            Ok(r#"{"reply":"ok"}"#.to_string())
        });

    let snapshot = SessionSnapshot {
        name: Some("Dana".to_string()),
        preferred_time: None,
    };
    extractor(client).extract("Tuesday at 3", &snapshot).await;

    let input = captured.lock().unwrap().clone().unwrap();
    let value: serde_json::Value = serde_json::from_str(&input).unwrap();
    assert_eq!(value["callerSaid"], "Tuesday at 3");
    assert_eq!(value["known"]["name"], "Dana");
    assert!(value["known"]["preferredTime"].is_null());
}

#[tokio::test]
async fn test_extract_falls_back_on_error() {
    let mut client = MockCompletion::new();
    client
        .expect_generate_response()
        .returning(|_, _| Err(anyhow::anyhow!("connection refused")));
    let result = extractor(client)
        .extract("hello", &SessionSnapshot::default())
        .await;
    assert_eq!(result, ExtractionResult::fallback());
    assert_eq!(result.utterance, prompts::EXTRACTION_FALLBACK);
}

#[tokio::test]
async fn test_extract_falls_back_on_timeout() {
    let client = SlowCompletion {
        delay: Duration::from_secs(5),
    };
    let extractor = LlmExtractor::new(Arc::new(client), Duration::from_millis(20));
    let result = extractor.extract("hello", &SessionSnapshot::default()).await;
    assert_eq!(result, ExtractionResult::fallback());
}

#[tokio::test]
async fn test_extract_falls_back_on_garbage() {
    for reply in ["", "no braces here", "{\"reply\": unterminated", r#"{"fields":{"name":"Dana"}}"#] {
        let result = extractor(replying(reply))
            .extract("hello", &SessionSnapshot::default())
            .await;
        assert_eq!(result, ExtractionResult::fallback(), "reply: {:?}", reply);
    }
}

#[test]
fn test_builder_requires_api_key() {
    assert!(OpenAiClientBuilder::new().build().is_err());
    assert!(OpenAiClientBuilder::new()
        .with_api_key("sk-test")
        .with_model("gpt-4o-mini")
        .with_base_url("http://localhost:9999/v1")
        .build()
        .is_ok());
}
