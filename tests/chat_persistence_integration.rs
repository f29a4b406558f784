//! Integration tests for chat persistence around the turn loop

mod common;

use common::{answer, calls, ScriptedModel, Step};
use geminibuddy::{
    execute_user_turn,
    session::{ChatStore, JsonlChatStore},
    tools::ToolRuntime,
    types::{ModelReply, Turn},
    AgentError,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Fixture {
    _temp: TempDir,
    store: JsonlChatStore,
    runtime: ToolRuntime,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("code")).unwrap();
    let store = JsonlChatStore::new(temp.path().join("chats")).unwrap();
    let runtime = ToolRuntime::new(temp.path().join("code")).unwrap();
    Fixture {
        _temp: temp,
        store,
        runtime,
    }
}

#[tokio::test]
async fn test_answered_turn_is_persisted_in_order() {
    let fx = fixture();
    let model = Arc::new(ScriptedModel::new(vec![
        Step::Reply(calls(vec![(
            "write_file",
            json!({"path": "hello.txt", "content": "hello"}),
        )])),
        Step::Reply(answer("Saved hello.txt")),
    ]));

    let report = execute_user_turn(
        &fx.store,
        "chat-a",
        "save a greeting",
        model,
        fx.runtime.clone(),
        5,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.answer, "Saved hello.txt");
    assert_eq!(report.iterations, 2);
    assert_eq!(report.new_turns, 4);

    let turns = fx.store.list("chat-a").unwrap();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[0], Turn::user("save a greeting"));
    assert!(matches!(turns[2], Turn::Tool { .. }));
    assert_eq!(turns[3], Turn::model(ModelReply::FinalAnswer("Saved hello.txt".to_string())));
}

#[tokio::test]
async fn test_next_turn_rereads_history() {
    let fx = fixture();
    let first = Arc::new(ScriptedModel::new(vec![Step::Reply(answer("first"))]));
    execute_user_turn(
        &fx.store,
        "chat-b",
        "one",
        first,
        fx.runtime.clone(),
        5,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let second = Arc::new(ScriptedModel::new(vec![Step::Reply(answer("second"))]));
    execute_user_turn(
        &fx.store,
        "chat-b",
        "two",
        second.clone(),
        fx.runtime.clone(),
        5,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let sent = second.sent();
    assert_eq!(sent[0].len(), 3);
    assert_eq!(sent[0].turns()[0], Turn::user("one"));
    assert_eq!(sent[0].turns()[2], Turn::user("two"));
}

#[tokio::test]
async fn test_exhausted_run_keeps_partial_transcript() {
    let fx = fixture();
    let model = Arc::new(ScriptedModel::always(calls(vec![(
        "list_directory",
        json!({"path": "."}),
    )])));

    let err = execute_user_turn(
        &fx.store,
        "chat-c",
        "never stop",
        model,
        fx.runtime.clone(),
        2,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AgentError::LoopExhausted { iterations: 2, .. }));

    let stored = fx.store.load_conversation("chat-c").unwrap();
    assert_eq!(stored.len(), 5);
    assert!(stored.is_well_formed());
    assert!(stored.render_transcript().contains("--- Tool list_directory [ok] ---"));
}

#[tokio::test]
async fn test_model_failure_persists_user_message() {
    let fx = fixture();
    let model = Arc::new(ScriptedModel::new(vec![Step::Fail(AgentError::ModelBlocked(
        "finish reason: SAFETY".to_string(),
    ))]));

    let err = execute_user_turn(
        &fx.store,
        "chat-d",
        "something",
        model,
        fx.runtime.clone(),
        5,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(err.is_model_failure());
    assert_eq!(fx.store.list("chat-d").unwrap(), vec![Turn::user("something")]);
}

#[tokio::test]
async fn test_invalid_chat_id_rejected_before_model_call() {
    let fx = fixture();
    let model = Arc::new(ScriptedModel::new(vec![Step::Reply(answer("unused"))]));

    let err = execute_user_turn(
        &fx.store,
        "../escape",
        "hi",
        model.clone(),
        fx.runtime.clone(),
        5,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AgentError::StoreError(_)));
    assert_eq!(model.call_count(), 0);
}
