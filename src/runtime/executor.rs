//! Turn controller: drives the state machine against real collaborators

use super::traits::{ConversationStore, LlmClient, ToolExecutor};
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, Usage};
use crate::settings::SessionSettings;
use crate::state_machine::{transition, Effect, Event, TurnContext, TurnErrorKind, TurnState};
use crate::store::{CapabilityRequest, CapabilityResult, ContentPart, Message, MessageContent};
use crate::tools::ToolContext;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A turn that ended without an answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TurnError {
    pub kind: TurnErrorKind,
    pub message: String,
}

impl TurnError {
    pub fn new(kind: TurnErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    /// Summed over every model call of the turn
    pub usage: Usage,
    pub model_calls: usize,
    pub tool_rounds: usize,
}

/// Runs one question through the model/tool loop
pub struct TurnController<S, L, T>
where
    S: ConversationStore,
    L: LlmClient + ?Sized,
    T: ToolExecutor,
{
    store: Arc<S>,
    llm_client: Arc<L>,
    tool_executor: Arc<T>,
    settings: Arc<SessionSettings>,
    system_prompt: String,
    llm_timeout: Duration,
}

/// Bookkeeping for one turn
#[derive(Default)]
struct TurnStats {
    usage: Usage,
    model_calls: usize,
    tool_rounds: usize,
}

impl<S, L, T> TurnController<S, L, T>
where
    S: ConversationStore,
    L: LlmClient + ?Sized,
    T: ToolExecutor,
{
    pub fn new(
        store: Arc<S>,
        llm_client: Arc<L>,
        tool_executor: Arc<T>,
        settings: Arc<SessionSettings>,
        system_prompt: String,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            store,
            llm_client,
            tool_executor,
            settings,
            system_prompt,
            llm_timeout,
        }
    }

    /// Run one full exchange. The caller serializes turns per thread.
    ///
    /// Messages are persisted as they are produced, so a failed turn leaves
    /// its partial history (at least the question) behind.
    pub async fn run_turn(&self, context: &TurnContext, question: String) -> Result<TurnOutcome, TurnError> {
        let mut state = TurnState::BuildInput;
        let mut stats = TurnStats::default();
        let mut next_event = Some(Event::UserQuestion { text: question });

        // Process events in a loop - no recursion
        while let Some(event) = next_event.take() {
            let result = transition(&state, context, event)
                .map_err(|e| TurnError::new(TurnErrorKind::Internal, e.to_string()))?;

            tracing::debug!(
                thread_id = %context.thread_id,
                from = state.name(),
                to = result.new_state.name(),
                "Turn transition"
            );
            state = result.new_state;

            for effect in result.effects {
                if let Some(generated) = self.execute_effect(context, effect, &mut stats).await? {
                    next_event = Some(generated);
                }
            }
        }

        match state {
            TurnState::Done { answer } => {
                tracing::info!(
                    thread_id = %context.thread_id,
                    model = %context.model_id,
                    model_calls = stats.model_calls,
                    tool_rounds = stats.tool_rounds,
                    total_tokens = stats.usage.total_tokens(),
                    "Turn complete"
                );
                Ok(TurnOutcome {
                    answer,
                    usage: stats.usage,
                    model_calls: stats.model_calls,
                    tool_rounds: stats.tool_rounds,
                })
            }
            TurnState::Failed { message, kind } => {
                tracing::warn!(
                    thread_id = %context.thread_id,
                    model = %context.model_id,
                    ?kind,
                    error = %message,
                    "Turn failed"
                );
                Err(TurnError::new(kind, message))
            }
            other => Err(TurnError::new(
                TurnErrorKind::Internal,
                format!("Turn stopped in state {}", other.name()),
            )),
        }
    }

    async fn execute_effect(
        &self,
        context: &TurnContext,
        effect: Effect,
        stats: &mut TurnStats,
    ) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::PersistMessage(message) => {
                self.store
                    .append(&context.thread_id, message)
                    .await
                    .map_err(|e| TurnError::new(TurnErrorKind::Storage, e.to_string()))?;
                Ok(None)
            }

            Effect::RequestModel => {
                stats.model_calls += 1;
                let history = self.store.get_history(&context.thread_id).await;
                let request = self.build_request(&history);

                let start = Instant::now();
                let outcome = tokio::time::timeout(self.llm_timeout, self.llm_client.complete(&request)).await;
                tracing::info!(
                    thread_id = %context.thread_id,
                    call = stats.model_calls,
                    duration_ms = %start.elapsed().as_millis(),
                    "Model call finished"
                );

                let event = match outcome {
                    Err(_) => Event::ModelError {
                        message: format!(
                            "Model call timed out after {} seconds",
                            self.llm_timeout.as_secs_f64()
                        ),
                        kind: TurnErrorKind::Timeout,
                    },
                    Ok(Err(e)) => Event::ModelError {
                        message: e.message,
                        kind: TurnErrorKind::Model,
                    },
                    Ok(Ok(response)) => {
                        stats.usage.add(&response.usage);
                        response_to_event(response)
                    }
                };
                Ok(Some(event))
            }

            Effect::DispatchTools { requests } => {
                stats.tool_rounds += 1;
                let results = join_all(requests.iter().map(|r| self.dispatch(context, r))).await;
                Ok(Some(Event::ToolsComplete { results }))
            }
        }
    }

    /// Run one request; every failure becomes an error result
    async fn dispatch(&self, context: &TurnContext, request: &CapabilityRequest) -> CapabilityResult {
        let start = Instant::now();
        let ctx = ToolContext::new(context.thread_id.clone(), self.settings.clone());
        let output = self
            .tool_executor
            .execute(&request.name, request.arguments.clone(), ctx)
            .await;

        let result = match output {
            Some(out) if out.success => CapabilityResult::success(request, out.output),
            Some(out) => CapabilityResult::error(request, out.output),
            None => {
                let known: Vec<String> = self
                    .tool_executor
                    .definitions()
                    .into_iter()
                    .map(|d| d.name)
                    .collect();
                CapabilityResult::error(
                    request,
                    format!(
                        "Error: {} is not a valid tool, try one of [{}].",
                        request.name,
                        known.join(", ")
                    ),
                )
            }
        };

        tracing::info!(
            thread_id = %context.thread_id,
            tool = %request.name,
            id = %request.id,
            is_error = result.is_error,
            duration_ms = %start.elapsed().as_millis(),
            "Tool executed"
        );
        result
    }

    fn build_request(&self, history: &[Message]) -> LlmRequest {
        let mut system = self.system_prompt.clone();
        for message in history {
            if let Message::System { content } = message {
                system.push_str("\n\n");
                system.push_str(content);
            }
        }

        LlmRequest {
            system,
            messages: history.iter().filter_map(message_to_llm).collect(),
            tools: self.tool_executor.definitions(),
            temperature: Some(0.0),
        }
    }
}

fn message_to_llm(message: &Message) -> Option<LlmMessage> {
    match message {
        Message::System { .. } => None,
        Message::User { content } => Some(LlmMessage {
            role: MessageRole::User,
            content: vec![ContentBlock::text(content)],
        }),
        Message::Assistant {
            content,
            capability_requests,
        } => {
            let mut blocks = match content {
                MessageContent::Text(text) if text.is_empty() => vec![],
                MessageContent::Text(text) => vec![ContentBlock::text(text)],
                MessageContent::Parts(parts) => parts
                    .iter()
                    .map(|p| match p {
                        ContentPart::Text { text } => ContentBlock::text(text),
                        ContentPart::Thought { text } => ContentBlock::Thought { text: text.clone() },
                    })
                    .collect(),
            };
            blocks.extend(
                capability_requests
                    .iter()
                    .map(|r| ContentBlock::tool_use(&r.id, &r.name, r.arguments.clone())),
            );
            Some(LlmMessage {
                role: MessageRole::Assistant,
                content: blocks,
            })
        }
        Message::ToolResult {
            request_id,
            name,
            content,
            is_error,
        } => Some(LlmMessage {
            role: MessageRole::User,
            content: vec![ContentBlock::tool_result(request_id, name, content, *is_error)],
        }),
    }
}

fn response_to_event(response: LlmResponse) -> Event {
    let requests = response
        .tool_uses()
        .into_iter()
        .map(|(id, name, input)| CapabilityRequest::new(id, name, input.clone()))
        .collect();

    let parts = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(ContentPart::Text { text }),
            ContentBlock::Thought { text } => Some(ContentPart::Thought { text }),
            ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. } => None,
        })
        .collect();

    Event::ModelResponse {
        content: MessageContent::from_parts(parts),
        requests,
    }
}
