//! Clock tool - current date and time in the configured timezone

use super::{parse_input, Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ClockTool;

#[derive(Debug, Deserialize)]
struct ClockInput {}

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &'static str {
        "datetime_info"
    }

    fn description(&self) -> String {
        "Returns the current date and time in ISO 8601 format, using the timezone configured for the system. Call this whenever a question depends on today's date or the current time.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        if let Err(e) = parse_input::<ClockInput>(input) {
            return e;
        }

        let timezone = ctx.settings().timezone();
        match timezone.parse::<Tz>() {
            Ok(tz) => {
                let now = Utc::now()
                    .with_timezone(&tz)
                    .to_rfc3339_opts(SecondsFormat::Micros, false);
                ToolOutput::success(format!("Current date and time ({timezone}): {now}"))
            }
            Err(e) => {
                tracing::warn!(thread_id = %ctx.thread_id, timezone = %timezone, "Stored timezone is invalid");
                ToolOutput::error(format!("Error getting date: {e}"))
            }
        }
    }
}
