//! Turn state types

use crate::store::CapabilityRequest;
use serde::Serialize;

/// Why a turn ended without an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnErrorKind {
    /// The model call exceeded its time bound
    Timeout,
    /// The model collaborator returned an error
    Model,
    /// The model kept requesting tools past the round cap
    ToolRoundLimit,
    /// History could not be appended
    Storage,
    Internal,
}

/// State of one exchange, from the inbound question to the final answer
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    /// Waiting for the user's question
    BuildInput,

    /// Model call outstanding. `round` counts completed dispatch rounds.
    AwaitModel { round: usize },

    /// Tool batch outstanding. `round` is 1-based.
    DispatchTools {
        round: usize,
        pending: Vec<CapabilityRequest>,
    },

    Done { answer: String },

    Failed { message: String, kind: TurnErrorKind },
}

impl TurnState {
    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done { .. } | TurnState::Failed { .. })
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            TurnState::BuildInput => "build_input",
            TurnState::AwaitModel { .. } => "await_model",
            TurnState::DispatchTools { .. } => "dispatch_tools",
            TurnState::Done { .. } => "done",
            TurnState::Failed { .. } => "failed",
        }
    }
}

/// Immutable parameters of a turn
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub thread_id: String,
    pub model_id: String,
    pub max_tool_rounds: usize,
}

impl TurnContext {
    pub fn new(thread_id: impl Into<String>, model_id: impl Into<String>, max_tool_rounds: usize) -> Self {
        Self {
            thread_id: thread_id.into(),
            model_id: model_id.into(),
            max_tool_rounds,
        }
    }
}
