use super::*;
use crate::dialogue::{self, TurnLimits};
use crate::llm::ExtractionResult;
use std::sync::Arc;
use std::time::Duration;

fn extraction(name: Option<&str>, time: Option<&str>) -> ExtractionResult {
    ExtractionResult {
        utterance: "ok".to_string(),
        name: name.map(str::to_string),
        preferred_time: time.map(str::to_string),
    }
}

#[test]
fn test_new_session_defaults() {
    let session = CallSession::new("CA1");
    assert_eq!(session.call_id, "CA1");
    assert_eq!(session.state, CallState::Initiated);
    assert_eq!(session.turn_count, 0);
    assert!(session.name.is_none());
    assert!(session.preferred_time.is_none());
    assert!(!session.booked);
    assert!(!session.transfer_attempted);
}

#[test]
fn test_get_or_create_returns_same_session() {
    let store = SessionStore::new(16, Duration::from_secs(60));
    let first = store.get_or_create("CA1");
    let second = store.get_or_create("CA1");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.len(), 1);

    let other = store.get_or_create("CA2");
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_remove() {
    let store = SessionStore::new(16, Duration::from_secs(60));
    store.get_or_create("CA1");
    assert!(store.get("CA1").is_some());
    assert!(store.remove("CA1").is_some());
    assert!(store.get("CA1").is_none());
    assert!(store.remove("CA1").is_none());
    assert!(store.is_empty());
}

#[test]
fn test_full_store_evicts_least_recently_touched() {
    let store = SessionStore::new(2, Duration::from_secs(3600));
    store.get_or_create("CA1");
    std::thread::sleep(Duration::from_millis(2));
    store.get_or_create("CA2");
    std::thread::sleep(Duration::from_millis(2));
    // touching CA1 makes CA2 the oldest
    store.get("CA1");
    std::thread::sleep(Duration::from_millis(2));
    store.get_or_create("CA3");

    assert_eq!(store.len(), 2);
    assert!(store.get("CA1").is_some());
    assert!(store.get("CA2").is_none());
    assert!(store.get("CA3").is_some());
}

#[test]
fn test_idle_sessions_expire() {
    let store = SessionStore::new(16, Duration::from_millis(10));
    store.get_or_create("CA1");
    std::thread::sleep(Duration::from_millis(30));
    store.get_or_create("CA2");
    assert_eq!(store.purge_expired(), 1);
    assert!(store.get("CA1").is_none());
    assert!(store.get("CA2").is_some());
}

#[tokio::test]
async fn test_concurrent_access_to_different_calls() {
    let store = Arc::new(SessionStore::new(256, Duration::from_secs(60)));
    let mut handles = Vec::new();
    for i in 0..32 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let call_id = format!("CA{}", i % 8);
            let session = store.get_or_create(&call_id);
            let mut session = session.lock().await;
            session.turn_count += 1;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(store.len(), 8);
    let total: u32 = store.list().iter().map(|s| s.turn_count).sum();
    assert_eq!(total, 32);
}

#[tokio::test]
async fn test_list_skips_sessions_mid_turn() {
    let store = SessionStore::new(16, Duration::from_secs(60));
    store.get_or_create("CA1");
    let busy = store.get_or_create("CA2");
    let _turn = busy.lock().await;

    let calls = store.list();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].call_id, "CA1");
    assert_eq!(store.len(), 2);
}

#[test]
fn test_fields_are_first_write_wins() {
    let limits = TurnLimits::default();
    let mut session = CallSession::new("CA1");
    session.state = CallState::Gathering;

    let decision = dialogue::decide(&session, Some(&extraction(Some("Dana"), None)), &limits);
    session.apply(&decision);
    assert_eq!(session.name.as_deref(), Some("Dana"));

    let decision = dialogue::decide(&session, Some(&extraction(Some("Robin"), None)), &limits);
    session.apply(&decision);
    assert_eq!(session.name.as_deref(), Some("Dana"));
    assert_eq!(session.turn_count, 2);
}

#[test]
fn test_booked_only_with_both_fields_and_never_reverts() {
    let limits = TurnLimits::default();
    let mut session = CallSession::new("CA1");
    session.state = CallState::Gathering;

    let decision = dialogue::decide(
        &session,
        Some(&extraction(Some("Dana"), Some("Tuesday at 3pm"))),
        &limits,
    );
    session.apply(&decision);
    assert!(session.booked);
    assert_eq!(session.state, CallState::Booked);
    assert!(session.has_both_fields());

    // a later turn reporting nothing cannot undo the booking
    let decision = dialogue::decide(&session, Some(&extraction(None, None)), &limits);
    session.apply(&decision);
    assert!(session.booked);
    assert_eq!(session.name.as_deref(), Some("Dana"));
    assert_eq!(session.preferred_time.as_deref(), Some("Tuesday at 3pm"));
}

#[test]
fn test_transfer_decision_marks_attempt() {
    let mut session = CallSession::new("CA1");
    session.apply(&dialogue::transfer("+15551112222", 20));
    assert!(session.transfer_attempted);
    assert_eq!(session.state, CallState::Transferring);
}

#[test]
fn test_speech_turn_resets_silence() {
    let limits = TurnLimits::default();
    let mut session = CallSession::new("CA1");
    session.state = CallState::Gathering;

    session.apply(&dialogue::decide(&session, None, &limits));
    session.apply(&dialogue::decide(&session, None, &limits));
    assert_eq!(session.silent_turns, 2);
    assert_eq!(session.turn_count, 0);

    session.apply(&dialogue::decide(
        &session,
        Some(&extraction(Some("Dana"), None)),
        &limits,
    ));
    assert_eq!(session.silent_turns, 0);
    assert_eq!(session.turn_count, 1);
}
