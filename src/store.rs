//! In-memory conversation store
//!
//! Holds one append-only message log per `thread_id`. Sessions are created on
//! first append and removed only by [`MemoryStore::reset`]. Nothing survives a
//! process restart; the runtime reaches the store through the
//! `ConversationStore` trait so a durable backend can replace it.

mod message;

pub use message::*;

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Tool result {0} does not follow an assistant message")]
    OrphanToolResult(String),
    #[error("Tool result {0} does not match any request of the preceding assistant message")]
    UnknownRequest(String),
    #[error("Tool request {0} was already answered")]
    AlreadyAnswered(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe message store keyed by `thread_id`
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `message` to the end of the session, creating it if needed
    pub fn append(&self, thread_id: &str, message: Message) -> StoreResult<()> {
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let history = sessions.entry(thread_id.to_string()).or_default();
        let role = message.role();
        let result = merge(history, message);
        tracing::debug!(thread_id = %thread_id, role, ok = result.is_ok(), "Message appended");
        if result.is_err() && history.is_empty() {
            sessions.remove(thread_id);
        }
        result
    }

    /// Messages of the session in insertion order; empty if it does not exist
    pub fn history(&self, thread_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(thread_id)
    }

    /// Drop every message of the session. Returns whether a session existed.
    pub fn reset(&self, thread_id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(thread_id)
            .is_some()
    }

    #[cfg(test)]
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Append-only merge of one message into a history.
///
/// Tool results must answer an outstanding request of the assistant message
/// that immediately precedes the current run of tool results.
pub fn merge(history: &mut Vec<Message>, message: Message) -> StoreResult<()> {
    if let Message::ToolResult { request_id, .. } = &message {
        check_tool_result(history, request_id)?;
    }
    history.push(message);
    Ok(())
}

fn check_tool_result(history: &[Message], request_id: &str) -> StoreResult<()> {
    let answered: Vec<&str> = history
        .iter()
        .rev()
        .map_while(|m| match m {
            Message::ToolResult { request_id, .. } => Some(request_id.as_str()),
            _ => None,
        })
        .collect();

    match history.iter().rev().nth(answered.len()) {
        Some(assistant @ Message::Assistant { .. }) => {
            if !assistant
                .capability_requests()
                .iter().any(|r| r.id == request_id) {
                Err(StoreError::UnknownRequest(request_id.to_string()))
            } else if answered.contains(&request_id) {
                Err(StoreError::AlreadyAnswered(request_id.to_string()))
            } else {
                Ok(())
            }
        }
        _ => Err(StoreError::OrphanToolResult(request_id.to_string())),
    }
}
