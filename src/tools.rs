//! Tools the agent can invoke
//!
//! Tools are stateless singletons registered once at startup. Everything a
//! call needs arrives through [`ToolContext`]; inputs decode into a per-tool
//! `serde` struct before the tool body runs.

mod calculator;
mod clock;
mod timestamp;

pub use calculator::CalculatorTool;
pub use clock::ClockTool;
pub use timestamp::TimestampTool;

use crate::llm::ToolDefinition;
use crate::settings::SessionSettings;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// All context needed for a tool invocation.
///
/// Created fresh for each tool call.
#[derive(Clone)]
pub struct ToolContext {
    /// The conversation this tool is executing within
    pub thread_id: String,

    /// Process-wide settings (timezone)
    settings: Arc<SessionSettings>,
}

impl ToolContext {
    pub fn new(thread_id: impl Into<String>, settings: Arc<SessionSettings>) -> Self {
        Self {
            thread_id: thread_id.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &'static str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool. Failures are reported through `ToolOutput::error`.
    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput;
}

/// Decode tool arguments into the tool's input struct.
///
/// Models sometimes send `null` for tools without parameters; that is treated
/// as an empty object.
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolOutput> {
    let input = if input.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| ToolOutput::error(format!("Invalid input: {e}")))
}

/// Fixed, ordered catalog of tools with lookup by exact name
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    /// The agent's standard catalog
    pub fn standard() -> Self {
        Self::from_tools(vec![
            Arc::new(ClockTool),
            Arc::new(TimestampTool),
            Arc::new(CalculatorTool),
        ])
    }

    /// Build a registry from an explicit list. Later duplicates are ignored.
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut unique: Vec<Arc<dyn Tool>> = Vec::with_capacity(tools.len());
        let mut by_name = HashMap::new();
        for tool in tools {
            if by_name.contains_key(tool.name()) {
                tracing::warn!(tool = tool.name(), "Duplicate tool name ignored");
                continue;
            }
            by_name.insert(tool.name(), unique.len());
            unique.push(tool);
        }
        Self {
            tools: unique,
            by_name,
        }
    }

    /// Get all tool definitions for LLM, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Tool names in registration order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.iter().map(|t| t.name())
    }

    /// Execute a tool by exact name. `None` if no such tool is registered.
    pub async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutput> {
        let tool = self.by_name.get(name).map(|&i| &self.tools[i])?;
        Some(tool.run(input, ctx).await)
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> ToolContext {
    ToolContext::new("test-thread", Arc::new(SessionSettings::default()))
}
