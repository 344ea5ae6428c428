mod common;

use std::cell::Cell;
use std::io::Cursor;
use std::sync::Arc;

use common::{engine_with, hit, index_with, FakeEmbedder, FakeLlm, FakeStore};
use rag::{
    ChatEngine, ChatMessage, ChatState, EngineOptions, FragmentStream, LanguageModel, Message, RagError,
    Role, Session, SseFragments, GREETING,
};

/// Streams a fixed server-sent body the way the completion endpoint would.
struct RawSse(&'static str);

impl LanguageModel for RawSse {
    fn complete(&self, _messages: &[ChatMessage]) -> Result<String, RagError> {
        Ok(String::new())
    }

    fn stream(&self, _messages: &[ChatMessage]) -> Result<FragmentStream, RagError> {
        Ok(Box::new(SseFragments::new(Cursor::new(self.0.as_bytes().to_vec()))))
    }
}

fn engine_over(llm: Arc<dyn LanguageModel>) -> ChatEngine {
    let index = index_with(Arc::new(FakeEmbedder::new()), Arc::new(FakeStore::with_hits(vec![])));
    ChatEngine::new(index, llm, "You are a kind listener.", EngineOptions::default())
}

#[test]
fn new_session_is_seeded_with_greeting() {
    let session = Session::new();
    assert_eq!(session.transcript(), &[Message::assistant(GREETING)]);
    assert_eq!(session.state(), ChatState::AwaitingInput);
    assert!(!session.has_engine());
}

#[test]
fn cycle_is_noop_when_last_message_is_assistant() {
    let llm = Arc::new(FakeLlm::replying(&["unused"]));
    let built = Cell::new(false);
    let mut session = Session::new();

    let out = session
        .run_cycle(
            || {
                built.set(true);
                Ok(engine_with(llm.clone(), vec![], EngineOptions::default()))
            },
            |_| panic!("no fragments expected"),
        )
        .expect("idle cycle should succeed");

    assert!(out.is_none());
    assert!(!built.get());
    assert_eq!(llm.stream_calls(), 0);
    assert_eq!(session.transcript().len(), 1);
}

#[test]
fn anxious_user_scenario_appends_streamed_reply() {
    let llm = Arc::new(FakeLlm::replying(&["It sounds ", "hard. ", "What feels most difficult?"]));
    let hits = vec![hit("doc-1", 0.9, "Gradual exposure helps hikikomori.")];
    let mut session = Session::new();

    session
        .submit("I feel anxious about leaving my room.")
        .expect("submission should be accepted");
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.state(), ChatState::PendingResponse);

    let mut streamed = Vec::new();
    let reply = session
        .run_cycle(
            || Ok(engine_with(llm.clone(), hits, EngineOptions::default())),
            |fragment| streamed.push(fragment.to_string()),
        )
        .expect("generation should succeed")
        .cloned()
        .expect("a reply should be appended");

    assert_eq!(llm.stream_calls(), 1);
    assert_eq!(streamed.len(), 3);
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, streamed.concat());
    assert_eq!(session.transcript().len(), 3);
    assert_eq!(session.state(), ChatState::AwaitingInput);
    assert_eq!(session.last_sources().len(), 1);
}

#[test]
fn turns_alternate_and_engine_is_built_once() {
    let llm = Arc::new(FakeLlm::replying(&["ok"]));
    let builds = Cell::new(0);
    let mut session = Session::new();

    for input in ["first", "second", "third"] {
        session.submit(input).expect("submission should be accepted");
        session
            .run_cycle(
                || {
                    builds.set(builds.get() + 1);
                    Ok(engine_with(llm.clone(), vec![], EngineOptions::default()))
                },
                |_| {},
            )
            .expect("generation should succeed");
    }

    assert_eq!(builds.get(), 1);
    assert_eq!(llm.stream_calls(), 3);
    let roles: Vec<Role> = session.transcript().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
        ]
    );
    assert_eq!(session.transcript()[3].content, "second");
}

#[test]
fn mid_stream_failure_keeps_user_turn_pending_and_next_cycle_retries() {
    let llm = Arc::new(FakeLlm::replying(&["Let's ", "take it slowly."]).failing_once());
    let mut session = Session::new();
    session
        .submit("I feel anxious about leaving my room.")
        .expect("submission should be accepted");

    let err = session
        .run_cycle(|| Ok(engine_with(llm.clone(), vec![], EngineOptions::default())), |_| {})
        .expect_err("first attempt should fail");
    assert!(matches!(err, RagError::GenerationFailed(_)));
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.transcript()[1].role, Role::User);
    assert_eq!(session.state(), ChatState::PendingResponse);

    let reply = session
        .run_cycle(|| panic!("engine is already built"), |_| {})
        .expect("retry should succeed")
        .cloned()
        .expect("retry should append a reply");
    assert_eq!(reply.content, "Let's take it slowly.");
    assert_eq!(llm.stream_calls(), 2);
    assert_eq!(session.transcript().len(), 3);
}

#[test]
fn engine_build_failure_is_not_remembered() {
    let llm = Arc::new(FakeLlm::replying(&["hello again"]));
    let mut session = Session::new();
    session.submit("hello").expect("submission should be accepted");

    let err = session
        .run_cycle(|| Err(RagError::ServiceUnavailable("index offline".to_string())), |_| {})
        .expect_err("unavailable index should fail the cycle");
    assert!(matches!(err, RagError::ServiceUnavailable(_)));
    assert!(!session.has_engine());
    assert_eq!(session.state(), ChatState::PendingResponse);

    session
        .run_cycle(|| Ok(engine_with(llm.clone(), vec![], EngineOptions::default())), |_| {})
        .expect("second cycle should connect and reply");
    assert!(session.has_engine());
    assert_eq!(session.transcript().len(), 3);
}

#[test]
fn blank_input_is_rejected_without_touching_state() {
    let mut session = Session::new();
    let err = session.submit("   \n").expect_err("blank input should be rejected");
    assert!(matches!(err, RagError::EmptyMessage));
    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.state(), ChatState::AwaitingInput);
}

#[test]
fn newer_submission_supersedes_pending_turn() {
    let llm = Arc::new(FakeLlm::replying(&["reply"]));
    let mut session = Session::new();
    session.submit("first try").expect("submission should be accepted");
    session.submit("second try").expect("submission should be accepted");

    session
        .run_cycle(|| Ok(engine_with(llm.clone(), vec![], EngineOptions::default())), |_| {})
        .expect("generation should succeed");

    let sent = llm.streamed_messages.lock().unwrap().clone();
    assert_eq!(sent.last().map(|m| m.content.as_str()), Some("second try"));
    assert_eq!(llm.stream_calls(), 1);
    assert_eq!(session.transcript().len(), 4);
}

#[test]
fn connection_dropped_before_done_leaves_turn_pending() {
    let llm: Arc<dyn LanguageModel> = Arc::new(RawSse(
        "data: {\"choices\":[{\"delta\":{\"content\":\"It sounds like \"}}]}\n\n",
    ));
    let mut session = Session::new();
    session.submit("I haven't left my room in weeks.").expect("submission should be accepted");

    let mut streamed = Vec::new();
    let err = session
        .run_cycle(|| Ok(engine_over(llm)), |f| streamed.push(f.to_string()))
        .expect_err("a truncated stream should fail the turn");

    assert!(matches!(err, RagError::GenerationFailed(ref m) if m.contains("before [DONE]")));
    assert_eq!(streamed, vec!["It sounds like "]);
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.transcript()[1].role, Role::User);
    assert_eq!(session.state(), ChatState::PendingResponse);
}

#[test]
fn empty_reply_is_a_failed_turn_not_a_blank_message() {
    let llm = Arc::new(FakeLlm::replying(&[]));
    let mut session = Session::new();
    session.submit("hello?").expect("submission should be accepted");

    let err = session
        .run_cycle(|| Ok(engine_with(llm.clone(), vec![], EngineOptions::default())), |_| {})
        .expect_err("an empty reply should fail the turn");

    assert!(matches!(err, RagError::GenerationFailed(_)));
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(session.state(), ChatState::PendingResponse);
    assert!(session.transcript().iter().all(|m| !m.content.is_empty()));
}
