//! Pure state transition function

use super::{Effect, Event, TurnContext, TurnErrorKind, TurnState};
use crate::store::{CapabilityRequest, CapabilityResult};
use thiserror::Error;

/// Output text for requests refused at the round cap
pub const ROUND_LIMIT_RESULT: &str = "not executed: tool round limit reached";

/// Result of a state transition
#[derive(Debug, PartialEq)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A turn is already in progress")]
    TurnInProgress,
    #[error("Turn already finished")]
    TurnFinished,
    #[error("Tool result {0} does not answer a pending request")]
    UnexpectedResult(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // The question is persisted before the model sees it
        (TurnState::BuildInput, Event::UserQuestion { text }) => {
            Ok(TransitionResult::new(TurnState::AwaitModel { round: 0 })
                .with_effect(Effect::persist_user_message(text))
                .with_effect(Effect::RequestModel))
        }

        (TurnState::AwaitModel { .. } | TurnState::DispatchTools { .. }, Event::UserQuestion { .. }) => {
            Err(TransitionError::TurnInProgress)
        }

        // No requests: the response is the answer
        (TurnState::AwaitModel { .. }, Event::ModelResponse { content, requests })
            if requests.is_empty() =>
        {
            let answer = content.answer_text();
            Ok(TransitionResult::new(TurnState::Done { answer })
                .with_effect(Effect::persist_assistant_message(content, vec![])))
        }

        (TurnState::AwaitModel { round }, Event::ModelResponse { content, requests })
            if *round < context.max_tool_rounds =>
        {
            Ok(TransitionResult::new(TurnState::DispatchTools {
                round: round + 1,
                pending: requests.clone(),
            })
            .with_effect(Effect::persist_assistant_message(content, requests.clone()))
            .with_effect(Effect::DispatchTools { requests }))
        }

        // Cap reached: answer every request without running it so the
        // history stays well formed, then give up
        (TurnState::AwaitModel { round }, Event::ModelResponse { content, requests }) => {
            let refused: Vec<Effect> = requests
                .iter()
                .map(|r| Effect::persist_tool_result(CapabilityResult::error(r, ROUND_LIMIT_RESULT)))
                .collect();
            Ok(TransitionResult::new(TurnState::Failed {
                message: format!("Model requested tools after {round} rounds; giving up"),
                kind: TurnErrorKind::ToolRoundLimit,
            })
            .with_effect(Effect::persist_assistant_message(content, requests))
            .with_effects(refused))
        }

        (TurnState::AwaitModel { .. }, Event::ModelError { message, kind }) => {
            Ok(TransitionResult::new(TurnState::Failed { message, kind }))
        }

        (TurnState::DispatchTools { round, pending }, Event::ToolsComplete { results }) => {
            let ordered = match_results(pending, results)?;
            Ok(TransitionResult::new(TurnState::AwaitModel { round: *round })
                .with_effects(ordered.into_iter().map(Effect::persist_tool_result))
                .with_effect(Effect::RequestModel))
        }

        (TurnState::Done { .. } | TurnState::Failed { .. }, _) => Err(TransitionError::TurnFinished),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {} with event {:?}",
            state.name(),
            event
        ))),
    }
}

/// One result per pending request, in request order.
///
/// A request with no result gets a synthetic error result; a result that
/// answers nothing pending is rejected.
fn match_results(
    pending: &[CapabilityRequest],
    mut results: Vec<CapabilityResult>,
) -> Result<Vec<CapabilityResult>, TransitionError> {
    if let Some(stray) = results
        .iter()
        .find(|r| !pending.iter().any(|p| p.id == r.request_id))
    {
        return Err(TransitionError::UnexpectedResult(stray.request_id.clone()));
    }

    Ok(pending
        .iter()
        .map(|request| {
            match results.iter().position(|r| r.request_id == request.id) {
                Some(i) => results.swap_remove(i),
                None => CapabilityResult::error(request, "Tool produced no result"),
            }
        })
        .collect())
}
