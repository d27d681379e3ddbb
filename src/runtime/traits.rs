//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the turn controller with mock implementations.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService, ToolDefinition};
use crate::store::{MemoryStore, Message, StoreError};
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Per-session message history
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a message, creating the session if needed
    async fn append(&self, thread_id: &str, message: Message) -> Result<(), StoreError>;

    /// Messages in insertion order; empty for an unknown session
    async fn get_history(&self, thread_id: &str) -> Vec<Message>;

    /// Remove the session. Returns whether it existed.
    async fn reset(&self, thread_id: &str) -> bool;

    async fn contains(&self, thread_id: &str) -> bool;
}

/// Client for making LLM requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Executor for tools
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool by exact name; `None` if it does not exist
    async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutput>;

    /// Get tool definitions for LLM
    fn definitions(&self) -> Vec<ToolDefinition>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn append(&self, thread_id: &str, message: Message) -> Result<(), StoreError> {
        (**self).append(thread_id, message).await
    }

    async fn get_history(&self, thread_id: &str) -> Vec<Message> {
        (**self).get_history(thread_id).await
    }

    async fn reset(&self, thread_id: &str) -> bool {
        (**self).reset(thread_id).await
    }

    async fn contains(&self, thread_id: &str) -> bool {
        (**self).contains(thread_id).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutput> {
        (**self).execute(name, input, ctx).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(&self, thread_id: &str, message: Message) -> Result<(), StoreError> {
        MemoryStore::append(self, thread_id, message)
    }

    async fn get_history(&self, thread_id: &str) -> Vec<Message> {
        self.history(thread_id)
    }

    async fn reset(&self, thread_id: &str) -> bool {
        MemoryStore::reset(self, thread_id)
    }

    async fn contains(&self, thread_id: &str) -> bool {
        MemoryStore::contains(self, thread_id)
    }
}

/// Adapter to use an `LlmService` as `LlmClient`
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.service.complete(request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutput> {
        ToolRegistry::execute(self, name, input, ctx).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        ToolRegistry::definitions(self)
    }
}
