//! Turn loop state machine
//!
//! Deterministic finite state machine driving one user turn:
//! - Safety: no transition outside the table below
//! - Liveness: every run ends in Done, Exhausted, Cancelled, or Failed
//! - Determinism: unique next phase per (phase, event)

use crate::errors::{AgentError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Turn loop phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopPhase {
    /// Conversation is ready to be sent to the model
    AwaitingModel,

    /// Model reply appended, not yet classified
    InspectingResponse,

    /// Running the requested tool batch in emitted order
    ExecutingTool,

    /// Final answer produced (terminal)
    Done,

    /// Iteration budget spent (terminal)
    Exhausted,

    /// Caller abandoned the run at an iteration boundary (terminal)
    Cancelled,

    /// Model call failed (terminal)
    Failed,
}

/// Events that trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// Model returned a reply
    ModelReplied,

    /// Reply was a final answer
    AnswerReceived,

    /// Reply was a tool-call batch
    ToolCallsRequested,

    /// Every call in the batch has a result
    ToolsComplete,

    /// Iteration cap reached before a final answer
    BudgetSpent,

    /// Cancellation observed at an iteration boundary
    CancelRequested,

    /// Model call returned an error
    ModelFailed,
}

impl LoopPhase {
    /// Check if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopPhase::Done | LoopPhase::Exhausted | LoopPhase::Cancelled | LoopPhase::Failed
        )
    }

    /// Attempt phase transition with validation
    ///
    /// Valid transitions:
    /// 1. AwaitingModel      → InspectingResponse (on: ModelReplied)
    /// 2. AwaitingModel      → Exhausted          (on: BudgetSpent)
    /// 3. AwaitingModel      → Cancelled          (on: CancelRequested)
    /// 4. AwaitingModel      → Failed             (on: ModelFailed)
    /// 5. InspectingResponse → Done               (on: AnswerReceived)
    /// 6. InspectingResponse → ExecutingTool      (on: ToolCallsRequested)
    /// 7. ExecutingTool      → AwaitingModel      (on: ToolsComplete)
    ///
    /// Terminal phases reject every event; a finished run is never resumed.
    pub fn transition(&self, event: LoopEvent) -> Result<LoopPhase> {
        use LoopEvent::*;
        use LoopPhase::*;

        let next = match (self, event) {
            (AwaitingModel, ModelReplied) => InspectingResponse,
            (AwaitingModel, BudgetSpent) => Exhausted,
            (AwaitingModel, CancelRequested) => Cancelled,
            (AwaitingModel, ModelFailed) => Failed,

            (InspectingResponse, AnswerReceived) => Done,
            (InspectingResponse, ToolCallsRequested) => ExecutingTool,

            (ExecutingTool, ToolsComplete) => AwaitingModel,

            (from, event) => {
                debug!(phase = from.display_name(), event = ?event, expected = ?from.valid_events(), "rejected loop event");
                return Err(AgentError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                });
            }
        };

        Ok(next)
    }

    /// Get all valid events from this phase
    pub fn valid_events(&self) -> Vec<LoopEvent> {
        use LoopEvent::*;
        use LoopPhase::*;

        match self {
            AwaitingModel => vec![ModelReplied, BudgetSpent, CancelRequested, ModelFailed],
            InspectingResponse => vec![AnswerReceived, ToolCallsRequested],
            ExecutingTool => vec![ToolsComplete],
            Done | Exhausted | Cancelled | Failed => vec![],
        }
    }

    /// Human-readable phase name
    pub fn display_name(&self) -> &'static str {
        match self {
            LoopPhase::AwaitingModel => "Awaiting Model",
            LoopPhase::InspectingResponse => "Inspecting Response",
            LoopPhase::ExecutingTool => "Executing Tools",
            LoopPhase::Done => "Completed",
            LoopPhase::Exhausted => "Iteration Limit Reached",
            LoopPhase::Cancelled => "Cancelled",
            LoopPhase::Failed => "Model Error",
        }
    }
}
