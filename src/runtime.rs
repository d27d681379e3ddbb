//! Runtime for executing turns
//!
//! Owns the collaborators and serializes turns per `thread_id`. Turns on
//! different threads run concurrently.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{TurnController, TurnError, TurnOutcome};
pub use traits::*;

use crate::settings::SessionSettings;
use crate::state_machine::TurnContext;
use crate::store::{MemoryStore, Message};
use crate::tools::ToolRegistry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = AgentRuntime<MemoryStore, dyn LlmClient, ToolRegistry>;

/// Everything needed to build an [`AgentRuntime`]
pub struct RuntimeOptions {
    pub system_prompt: String,
    pub max_tool_rounds: usize,
    pub llm_timeout: Duration,
}

/// Manager for all conversation sessions
pub struct AgentRuntime<S, L, T>
where
    S: ConversationStore,
    L: LlmClient + ?Sized,
    T: ToolExecutor,
{
    store: Arc<S>,
    controller: TurnController<S, L, T>,
    model_id: String,
    max_tool_rounds: usize,
    /// One lock per thread id. Entries are never removed; a reset session
    /// keeps its (idle) lock.
    session_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, L, T> AgentRuntime<S, L, T>
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
        options: RuntimeOptions,
    ) -> Self {
        let model_id = llm_client.model_id().to_string();
        Self {
            controller: TurnController::new(
                store.clone(),
                llm_client,
                tool_executor,
                settings,
                options.system_prompt,
                options.llm_timeout,
            ),
            store,
            model_id,
            max_tool_rounds: options.max_tool_rounds,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn session_lock(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.session_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// Answer `question` within the session, waiting for any turn already
    /// running on the same thread
    pub async fn chat(&self, thread_id: &str, question: String) -> Result<TurnOutcome, TurnError> {
        let lock = self.session_lock(thread_id);
        let _guard = lock.lock().await;

        tracing::info!(thread_id = %thread_id, "Starting turn");
        let context = TurnContext::new(thread_id, &self.model_id, self.max_tool_rounds);
        self.controller.run_turn(&context, question).await
    }

    /// Session history, or `None` if the session does not exist
    pub async fn context(&self, thread_id: &str) -> Option<Vec<Message>> {
        if self.store.contains(thread_id).await {
            Some(self.store.get_history(thread_id).await)
        } else {
            None
        }
    }

    /// Forget the session. Waits for a running turn on the same thread.
    pub async fn reset(&self, thread_id: &str) -> bool {
        let lock = self.session_lock(thread_id);
        let _guard = lock.lock().await;

        let existed = self.store.reset(thread_id).await;
        tracing::info!(thread_id = %thread_id, existed, "Session reset");
        existed
    }
}
