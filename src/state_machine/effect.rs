//! Effects produced by state transitions

use crate::store::{CapabilityRequest, CapabilityResult, Message, MessageContent};

/// Effects to be executed after a transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the session history
    PersistMessage(Message),

    /// Call the model with the persisted history
    RequestModel,

    /// Run a batch of tool requests
    DispatchTools { requests: Vec<CapabilityRequest> },
}

impl Effect {
    pub fn persist_user_message(text: impl Into<String>) -> Self {
        Effect::PersistMessage(Message::user(text))
    }

    pub fn persist_assistant_message(content: MessageContent, requests: Vec<CapabilityRequest>) -> Self {
        Effect::PersistMessage(Message::assistant(content, requests))
    }

    pub fn persist_tool_result(result: CapabilityResult) -> Self {
        Effect::PersistMessage(result.into_message())
    }
}
