//! Process configuration read from the environment

use crate::rate_limit::LIMIT_PER_MINUTE;
use crate::settings::DEFAULT_TIMEZONE;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// LLM collaborator configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub gateway: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub llm: LlmConfig,
    pub rate_limit_per_minute: usize,
    pub max_tool_rounds: usize,
    /// Initial timezone, validated at startup
    pub timezone: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable numbers fall back to their defaults; empty strings count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str| {
            let raw = get(key)?;
            let value = raw.trim().parse::<u64>().ok();
            if value.is_none() {
                tracing::warn!(key, value = %raw, "Ignoring unparseable setting");
            }
            value
        };

        Self {
            port: parsed("REACT_AGENT_PORT")
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or(DEFAULT_PORT),
            llm: LlmConfig {
                api_key: get("GOOGLE_API_KEY"),
                model: get("REACT_AGENT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                gateway: get("LLM_GATEWAY"),
                timeout: parsed("REACT_AGENT_LLM_TIMEOUT_SECS")
                    .filter(|s| *s > 0)
                    .map_or(DEFAULT_LLM_TIMEOUT, Duration::from_secs),
            },
            rate_limit_per_minute: parsed("REACT_AGENT_RATE_LIMIT")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(LIMIT_PER_MINUTE),
            max_tool_rounds: parsed("REACT_AGENT_MAX_TOOL_ROUNDS")
                .and_then(|n| usize::try_from(n).ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS),
            timezone: get("REACT_AGENT_TIMEZONE")
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
