//! Timezone normalization policy.
//!
//! Destination timestamps are stored naive. Every offset-carrying timestamp is
//! converted to one reference timezone and then stripped; this is the only
//! place in the pipeline that reasons about timezones.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Error during MySQL type handling.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),
}

/// Reference timezone used to store timestamps naive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezonePolicy {
    tz: Tz,
}

impl Default for TimezonePolicy {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimezonePolicy {
    /// Create a policy for the given timezone.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Policy storing timestamps as UTC.
    pub fn utc() -> Self {
        Self::new(Tz::UTC)
    }

    /// Parse an IANA timezone name (e.g. `Africa/Lagos`).
    pub fn from_name(name: &str) -> Result<Self, ConversionError> {
        name.parse::<Tz>()
            .map(Self::new)
            .map_err(|_| ConversionError::UnknownTimezone(name.to_string()))
    }

    /// The reference timezone.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Convert an offset-carrying timestamp to the reference timezone and
    /// strip the offset.
    pub fn normalize(&self, ts: &DateTime<FixedOffset>) -> NaiveDateTime {
        ts.with_timezone(&self.tz).naive_local()
    }

    /// Naive form of a UTC instant in the reference timezone.
    pub fn from_utc(&self, ts: &DateTime<Utc>) -> NaiveDateTime {
        self.tz.from_utc_datetime(&ts.naive_utc()).naive_local()
    }

    /// Current wall-clock time in the reference timezone.
    pub fn now(&self) -> NaiveDateTime {
        self.from_utc(&Utc::now())
    }
}
