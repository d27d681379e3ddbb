//! Conversation message types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single entry in a session's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: MessageContent,
        /// Tool invocations requested by the model, in the order it emitted them
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        capability_requests: Vec<CapabilityRequest>,
    },
    ToolResult {
        /// Id of the `CapabilityRequest` this result answers
        request_id: String,
        name: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: MessageContent, capability_requests: Vec<CapabilityRequest>) -> Self {
        Message::Assistant {
            content,
            capability_requests,
        }
    }

    /// Role name as exposed over the API
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::ToolResult { .. } => "tool_result",
        }
    }

    /// Capability requests carried by an assistant message (empty otherwise)
    pub fn capability_requests(&self) -> &[CapabilityRequest] {
        match self {
            Message::Assistant {
                capability_requests,
                ..
            } => capability_requests,
            _ => &[],
        }
    }
}

/// Message body: plain text, or a sequence of structured parts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Build content from model output parts.
    ///
    /// Plain text parts collapse into a single string; anything richer is kept
    /// as a part sequence.
    pub fn from_parts(parts: Vec<ContentPart>) -> Self {
        if parts.iter().all(|p| matches!(p, ContentPart::Text { .. })) {
            let text = parts
                .into_iter()
                .map(|p| match p {
                    ContentPart::Text { text } | ContentPart::Thought { text } => text,
                })
                .collect::<String>();
            MessageContent::Text(text)
        } else {
            MessageContent::Parts(parts)
        }
    }

    /// Text shown to the user as the answer.
    ///
    /// For part sequences this is the first textual part; empty if there is none.
    pub fn answer_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .find_map(|p| match p {
                    ContentPart::Text { text } => Some(text.clone()),
                    ContentPart::Thought { .. } => None,
                })
                .unwrap_or_default(),
        }
    }
}

/// Structured part of an assistant message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    /// Reasoning summary emitted by the model; never used as the answer
    Thought { text: String },
}

/// A tool invocation emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl CapabilityRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of dispatching one `CapabilityRequest`.
///
/// Failures are carried as text with `is_error` set; they never abort a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub request_id: String,
    pub name: String,
    pub output: String,
    pub is_error: bool,
}

impl CapabilityResult {
    pub fn success(request: &CapabilityRequest, output: impl Into<String>) -> Self {
        Self {
            request_id: request.id.clone(),
            name: request.name.clone(),
            output: output.into(),
            is_error: false,
        }
    }

    pub fn error(request: &CapabilityRequest, message: impl Into<String>) -> Self {
        Self {
            request_id: request.id.clone(),
            name: request.name.clone(),
            output: message.into(),
            is_error: true,
        }
    }

    pub fn into_message(self) -> Message {
        Message::ToolResult {
            request_id: self.request_id,
            name: self.name,
            content: self.output,
            is_error: self.is_error,
        }
    }
}
