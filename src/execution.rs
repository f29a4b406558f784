//! Turn execution service
//!
//! Glues the chat store to the turn loop: re-reads the chat, runs the loop,
//! and persists every turn the run added, whatever its outcome. Also keeps
//! the chat's metadata (model, title) current.

use crate::agent::{LoopState, TurnLoop};
use crate::errors::{AgentError, Result};
use crate::models::ModelClient;
use crate::session::{normalize_title, validate_chat_id, ChatMeta, ChatStore, UNTITLED_CHAT_TITLE};
use crate::tools::ToolRuntime;
use crate::types::{Turn, TurnReport};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run one user turn in a chat
///
/// Persisted turns are the source of truth: the chat is re-read on every
/// call. Turns added during the run are appended in order even when the run
/// ends in exhaustion, cancellation, or a model error, so the stored chat
/// always holds complete tool rounds. The run's turns are written with one
/// [`ChatStore::append_all`], so a failed write stores none of them.
///
/// The chat's metadata records `model.model_name()`; a chat continued on a
/// different model has its metadata updated.
pub async fn execute_user_turn(
    store: &dyn ChatStore,
    chat_id: &str,
    prompt: &str,
    model: Arc<dyn ModelClient>,
    runtime: ToolRuntime,
    max_iterations: usize,
    cancel: &CancellationToken,
) -> Result<TurnReport> {
    validate_chat_id(chat_id)?;
    if prompt.trim().is_empty() {
        return Err(AgentError::Generic("Prompt is empty".to_string()));
    }

    let start = Instant::now();
    let history = store.load_conversation(chat_id)?;
    if !history.is_well_formed() {
        return Err(AgentError::StoreError(format!(
            "Chat {} has tool calls without matching results",
            chat_id
        )));
    }

    record_model(store, chat_id, model.model_name())?;

    let base_len = history.len();
    let mut state = LoopState::new(history, prompt);
    let controller = TurnLoop::new(model, runtime, max_iterations);

    let outcome = controller.run(&mut state, cancel).await;

    let new_turns = state.conversation.turns_since(base_len);
    let persisted = store.append_all(chat_id, new_turns).map(|_| ());

    let answer = match (outcome, persisted) {
        (Ok(answer), Ok(())) => answer,
        (Ok(_), Err(store_err)) => return Err(store_err),
        (Err(run_err), Ok(())) => return Err(run_err),
        (Err(run_err), Err(store_err)) => {
            warn!(chat_id, error = %store_err, "failed to persist partial transcript");
            return Err(run_err);
        }
    };

    let (tool_calls, failed_tool_calls) = new_turns.iter().fold((0, 0), |(calls, failed), turn| match turn {
        Turn::Tool { result } => (calls + 1, failed + usize::from(!result.is_success())),
        _ => (calls, failed),
    });

    let report = TurnReport {
        chat_id: chat_id.to_string(),
        answer,
        iterations: state.iteration_count,
        new_turns: new_turns.len(),
        tool_calls,
        failed_tool_calls,
        duration: start.elapsed(),
    };
    info!(chat_id, summary = %report.summary(), "turn complete");

    Ok(report)
}

/// Create the chat's metadata, or point it at the model now in use
fn record_model(store: &dyn ChatStore, chat_id: &str, model_name: &str) -> Result<()> {
    match store.meta(chat_id)? {
        None => store.save_meta(chat_id, &ChatMeta::new(model_name)),
        Some(mut meta) if meta.model != model_name => {
            info!(chat_id, from = %meta.model, to = model_name, "chat model changed");
            meta.model = model_name.to_string();
            store.save_meta(chat_id, &meta)
        }
        Some(_) => Ok(()),
    }
}

/// Name an untitled chat after its opening prompt
///
/// Asks `titler` for a short title; if that fails or comes back empty, the
/// first words of the prompt are used. Chats that already have a title are
/// left alone. Returns the title that was set, if any.
pub async fn title_chat(
    store: &dyn ChatStore,
    chat_id: &str,
    prompt: &str,
    titler: &dyn ModelClient,
) -> Result<Option<String>> {
    match store.meta(chat_id)? {
        Some(meta) if meta.is_untitled() => {}
        _ => return Ok(None),
    }

    let request = format!(
        "Reply with only a short title of 3 to 5 words for a chat that opens with this message: \"{}\"",
        prompt.trim()
    );
    let title = match titler.complete(&request).await {
        Ok(text) => normalize_title(&text),
        Err(e) => {
            warn!(chat_id, error = %e, "title generation failed, using prompt");
            UNTITLED_CHAT_TITLE.to_string()
        }
    };
    let title = if title == UNTITLED_CHAT_TITLE {
        title_from_prompt(prompt)
    } else {
        title
    };

    store.rename(chat_id, &title)?;
    info!(chat_id, title = %title, "chat titled");
    Ok(Some(title))
}

/// First few words of the prompt as a title
fn title_from_prompt(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split_whitespace().take(6).collect();
    normalize_title(&words.join(" "))
}
