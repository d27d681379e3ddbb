//! Fixed system directive sent ahead of every model request

use crate::tools::ToolRegistry;
use std::fmt::Write;

/// Base system prompt establishing the agent's role
const BASE_PROMPT: &str = r"You are a helpful assistant that answers the user's questions.
Do not ask follow-up questions when you can find the information yourself with your tools. Use your tools whenever possible.

Important rule: if a question involves a calculation with a date (such as 'today', 'tomorrow', 'last week'), you MUST first call `datetime_info` to get the current date, then you MUST call `convert_date_to_timestamp` on that result, and finally use `math_calculator` with the numeric timestamp. Never extract date components by hand.";

/// Build the directive, listing the tools the model can call
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let mut prompt = BASE_PROMPT.to_string();

    let names: Vec<&str> = tools.names().collect();
    if !names.is_empty() {
        let _ = write!(prompt, "\n\nAvailable tools: {}.", names.join(", "));
    }

    prompt
}
