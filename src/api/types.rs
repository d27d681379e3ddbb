//! API request and response types

use crate::llm::Usage;
use serde::{Deserialize, Serialize};

/// Thread used when a chat request names none
pub const DEFAULT_THREAD_ID: &str = "default_user";

fn default_thread_id() -> String {
    DEFAULT_THREAD_ID.to_string()
}

/// Request to ask the agent a question
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default = "default_thread_id")]
    pub thread_id: String,
}

/// Answer plus execution details
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub metadata: ChatMetadata,
}

#[derive(Debug, Serialize)]
pub struct ChatMetadata {
    pub execution_time_seconds: f64,
    pub tokens: TokenUsage,
    pub model: String,
    pub thread_id: String,
}

/// Token counts summed over every model call of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl From<Usage> for TokenUsage {
    fn from(usage: Usage) -> Self {
        Self {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens(),
        }
    }
}

/// Request to change the clock tool's timezone
#[derive(Debug, Deserialize)]
pub struct TimezoneRequest {
    pub timezone: String,
}

#[derive(Debug, Serialize)]
pub struct TimezoneResponse {
    pub status: &'static str,
    pub current_timezone: String,
}

/// Outcome of deleting a session's context
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: "warning",
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
