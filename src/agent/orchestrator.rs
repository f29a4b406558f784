//! Turn loop controller
//!
//! Drives one user turn to completion:
//! - Sends the full conversation to the model
//! - Executes requested tool batches in emitted order
//! - Appends one result per request before the next model call
//! - Stops on a final answer, the iteration cap, cancellation, or a model error
//!
//! The controller keeps no per-run state of its own; everything a run mutates
//! lives in the [`LoopState`] passed to [`TurnLoop::run`].

use crate::agent::state::{LoopEvent, LoopPhase};
use crate::errors::{AgentError, Result};
use crate::models::ModelClient;
use crate::tools::{ToolCallRequest, ToolRuntime};
use crate::types::{Conversation, ModelReply, Turn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default iteration cap for one user turn
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Mutable state of one user turn
#[derive(Debug, Clone)]
pub struct LoopState {
    /// Model calls made so far
    pub iteration_count: usize,

    /// Conversation including the new user message
    pub conversation: Conversation,

    /// Whether the run reached a terminal phase
    pub terminated: bool,

    /// Final answer once produced
    pub final_answer: Option<String>,

    phase: LoopPhase,
}

impl LoopState {
    /// Start a turn: prior conversation plus the new user message
    pub fn new(conversation: Conversation, user_message: impl Into<String>) -> Self {
        let mut conversation = conversation;
        conversation.push(Turn::user(user_message));

        Self {
            iteration_count: 0,
            conversation,
            terminated: false,
            final_answer: None,
            phase: LoopPhase::AwaitingModel,
        }
    }

    /// Current loop phase
    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    fn advance(&mut self, event: LoopEvent) -> Result<()> {
        let next = self.phase.transition(event)?;
        debug!(
            from = self.phase.display_name(),
            to = next.display_name(),
            iteration = self.iteration_count,
            "loop phase transition"
        );
        self.phase = next;
        self.terminated = next.is_terminal();
        Ok(())
    }

    fn snapshot(&self) -> Box<Conversation> {
        Box::new(self.conversation.clone())
    }
}

/// Turn loop controller
#[derive(Clone)]
pub struct TurnLoop {
    model: Arc<dyn ModelClient>,
    runtime: ToolRuntime,
    max_iterations: usize,
}

impl TurnLoop {
    /// Create controller for one model and one sandbox
    pub fn new(model: Arc<dyn ModelClient>, runtime: ToolRuntime, max_iterations: usize) -> Self {
        Self {
            model,
            runtime,
            max_iterations,
        }
    }

    /// Run the loop until a final answer or a terminal error
    ///
    /// One iteration is one model call plus execution of the batch it
    /// requested. The cap and the cancellation token are both checked at
    /// every iteration boundary, before the next model call.
    pub async fn run(&self, state: &mut LoopState, cancel: &CancellationToken) -> Result<String> {
        if state.phase.is_terminal() {
            return Err(AgentError::InvalidTransition {
                from: format!("{:?}", state.phase),
                event: "run".to_string(),
            });
        }

        let schemas = self.runtime.schemas();
        info!(
            model = %self.model.model_name(),
            max_iterations = self.max_iterations,
            "starting turn loop"
        );

        loop {
            if cancel.is_cancelled() {
                state.advance(LoopEvent::CancelRequested)?;
                info!(iterations = state.iteration_count, "turn loop cancelled");
                return Err(AgentError::Cancelled {
                    iterations: state.iteration_count,
                    transcript: state.snapshot(),
                });
            }

            if state.iteration_count >= self.max_iterations {
                state.advance(LoopEvent::BudgetSpent)?;
                warn!(iterations = state.iteration_count, "turn loop exhausted");
                return Err(AgentError::LoopExhausted {
                    iterations: state.iteration_count,
                    transcript: state.snapshot(),
                });
            }

            state.iteration_count += 1;
            debug!(
                iteration = state.iteration_count,
                turns = state.conversation.len(),
                "sending conversation to model"
            );

            let reply = match self.model.send(&state.conversation, &schemas).await {
                Ok(reply) => reply,
                Err(e) => {
                    state.advance(LoopEvent::ModelFailed)?;
                    warn!(iteration = state.iteration_count, error = %e, "model call failed");
                    return Err(e);
                }
            };
            state.advance(LoopEvent::ModelReplied)?;

            match reply {
                ModelReply::FinalAnswer(text) => {
                    state
                        .conversation
                        .push(Turn::model(ModelReply::FinalAnswer(text.clone())));
                    state.advance(LoopEvent::AnswerReceived)?;
                    state.final_answer = Some(text.clone());

                    info!(iterations = state.iteration_count, "turn loop finished");
                    return Ok(text);
                }
                ModelReply::ToolCallBatch(calls) => {
                    let calls = assign_call_ids(state.iteration_count, calls);
                    state
                        .conversation
                        .push(Turn::model(ModelReply::ToolCallBatch(calls.clone())));
                    state.advance(LoopEvent::ToolCallsRequested)?;

                    debug!(
                        iteration = state.iteration_count,
                        calls = calls.len(),
                        "executing tool batch"
                    );
                    for call in &calls {
                        let result = self.runtime.execute(call);
                        state.conversation.push(Turn::tool(result));
                    }

                    state.advance(LoopEvent::ToolsComplete)?;
                }
            }
        }
    }
}

/// Replace model-supplied ids with `call-<iteration>-<index>`
///
/// Ids from the model are not trusted to be unique; duplicates within one
/// batch are executed in order like any other call.
fn assign_call_ids(iteration: usize, calls: Vec<ToolCallRequest>) -> Vec<ToolCallRequest> {
    calls
        .into_iter()
        .enumerate()
        .map(|(index, call)| call.with_id(format!("call-{}-{}", iteration, index)))
        .collect()
}
