//! Process-wide session settings read by tools during dispatch
//!
//! Currently a single value: the timezone used by the clock tool. The value is
//! stored unvalidated; callers that accept user input check it with
//! [`is_known_timezone`] first.

use chrono_tz::Tz;
use std::sync::{PoisonError, RwLock};

/// Timezone used when nothing else has been configured
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Mutable settings shared by every conversation
#[derive(Debug)]
pub struct SessionSettings {
    timezone: RwLock<String>,
}

impl SessionSettings {
    pub fn new(timezone: impl Into<String>) -> Self {
        Self {
            timezone: RwLock::new(timezone.into()),
        }
    }

    /// Current timezone identifier
    pub fn timezone(&self) -> String {
        self.timezone
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the timezone identifier. Last write wins.
    pub fn set_timezone(&self, timezone: impl Into<String>) {
        let timezone = timezone.into();
        tracing::info!(timezone = %timezone, "Timezone updated");
        *self
            .timezone
            .write()
            .unwrap_or_else(PoisonError::into_inner) = timezone;
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

/// Whether `id` names a timezone in the IANA database (case-sensitive)
pub fn is_known_timezone(id: &str) -> bool {
    id.parse::<Tz>().is_ok()
}
