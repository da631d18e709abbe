//! Timestamp Clock
//!
//! Stamps broadcast envelopes with wall-clock time in a fixed named timezone,
//! independent of the server locale.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Format used for the `time` field of every envelope
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Timezone used when none is configured
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// Formats instants as `HH:MM:SS` in one named timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampClock {
    tz: Tz,
}

impl StampClock {
    /// Create a clock for the given timezone
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Create a clock from an IANA timezone name (e.g. "Europe/Berlin")
    pub fn from_name(name: &str) -> Result<Self, ClockError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| ClockError::UnknownTimezone(name.to_string()))
    }

    /// The timezone this clock stamps in
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Current time formatted for an envelope
    pub fn stamp(&self) -> String {
        self.stamp_at(Utc::now())
    }

    /// Format a specific instant
    pub fn stamp_at(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.tz).format(TIME_FORMAT).to_string()
    }
}

impl Default for StampClock {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Berlin)
    }
}

#[derive(Debug, Error)]
pub enum ClockError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}
