//! Timestamp tool - converts an ISO 8601 date-time into Unix epoch seconds

use super::{parse_input, Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{json, Value};

/// Date-time layouts with an explicit offset, tried after RFC 3339
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
];

/// Layouts without an offset; interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Prefix produced by the clock tool; tolerated so its output can be passed through
const CLOCK_PREFIX: &str = "Current date and time (";

pub struct TimestampTool;

#[derive(Debug, Deserialize)]
struct TimestampInput {
    date_string: String,
}

#[async_trait]
impl Tool for TimestampTool {
    fn name(&self) -> &'static str {
        "convert_date_to_timestamp"
    }

    fn description(&self) -> String {
        "Converts a date/time in ISO 8601 format into a numeric Unix timestamp (seconds since 1970-01-01 UTC). Use it to turn dates into numbers before passing them to the calculator.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["date_string"],
            "properties": {
                "date_string": {
                    "type": "string",
                    "description": "Date/time in ISO 8601 format, e.g. 2024-05-01T13:45:00-05:00"
                }
            }
        })
    }

    async fn run(&self, input: Value, _ctx: ToolContext) -> ToolOutput {
        let input: TimestampInput = match parse_input(input) {
            Ok(i) => i,
            Err(e) => return e,
        };

        match parse_iso8601(&input.date_string) {
            Ok(dt) => ToolOutput::success(epoch_seconds(&dt)),
            Err(e) => ToolOutput::error(format!(
                "Conversion error: {e}. Make sure the format is ISO 8601."
            )),
        }
    }
}

/// Parse the ISO 8601 shapes models commonly produce
pub fn parse_iso8601(input: &str) -> Result<DateTime<FixedOffset>, String> {
    let mut s = input.trim();
    if let Some(rest) = s.strip_prefix(CLOCK_PREFIX) {
        if let Some((_, ts)) = rest.split_once("): ") {
            s = ts.trim();
        }
    }
    if s.is_empty() {
        return Err("empty date string".to_string());
    }

    let rfc3339_err = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => return Ok(dt),
        Err(e) => e,
    };

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }

    Err(format!("invalid isoformat string '{s}' ({rfc3339_err})"))
}

/// Epoch seconds as a float string (`1704067200.0`, `1704067200.25`)
#[allow(clippy::cast_precision_loss)]
fn epoch_seconds(dt: &DateTime<FixedOffset>) -> String {
    let micros = dt.timestamp_micros();
    let seconds = micros as f64 / 1_000_000.0;
    let text = seconds.to_string();
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}
