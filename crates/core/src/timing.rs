//! Timestamps and FIX time formatting
//!
//! FIX carries times as `UTCTimestamp` strings (`20200512-14:03:27.118`).
//! Venues differ in how many fractional digits they send, so parsing accepts
//! seconds through nanoseconds.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// `UTCTimestamp` layout with millisecond precision.
pub const FIX_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H:%M:%S%.3f";

/// Nanosecond timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    /// Nanoseconds since Unix epoch
    pub nanos: u64,
}

impl Timestamp {
    pub fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    pub fn now() -> Self {
        Self { nanos: nanos() }
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        let secs = self.nanos / 1_000_000_000;
        let nsecs = (self.nanos % 1_000_000_000) as u32;
        DateTime::from_timestamp(secs as i64, nsecs).unwrap_or_else(Utc::now)
    }

    pub fn elapsed_nanos(&self) -> u64 {
        nanos().saturating_sub(self.nanos)
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.elapsed_nanos() / 1_000
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed_nanos() / 1_000_000
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        let nanos = dt.timestamp() as u64 * 1_000_000_000 + dt.timestamp_subsec_nanos() as u64;
        Self { nanos }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%d %H:%M:%S%.9f UTC"))
    }
}

/// Wall-clock nanoseconds since the Unix epoch.
#[inline]
pub fn nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Format a time as a FIX `UTCTimestamp` with millisecond precision.
pub fn fix_utc_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(FIX_TIMESTAMP_FORMAT).to_string()
}

/// Parse a FIX `UTCTimestamp` with 0, 3, 6 or 9 fractional digits.
pub fn parse_fix_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let parsed = if value.contains('.') {
        NaiveDateTime::parse_from_str(value, "%Y%m%d-%H:%M:%S%.f")
    } else {
        NaiveDateTime::parse_from_str(value, "%Y%m%d-%H:%M:%S")
    };
    parsed.ok().map(|naive| naive.and_utc())
}

/// Microseconds since the epoch for a FIX `UTCTimestamp`; sub-microsecond
/// digits are dropped.
pub fn fix_timestamp_to_micros(value: &str) -> Option<i64> {
    parse_fix_timestamp(value).map(|dt| dt.timestamp_micros())
}

/// Measures a span and logs it at debug level when dropped.
pub struct PerfTimer {
    start: Timestamp,
    name: String,
}

impl PerfTimer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Timestamp::now(),
            name: name.into(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed_micros()
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.start.elapsed_millis()
    }

    pub fn log_elapsed(&self) {
        let micros = self.elapsed_micros();
        if micros < 1000 {
            tracing::debug!("⏱️  {} took {}μs", self.name, micros);
        } else {
            tracing::debug!("⏱️  {} took {:.3}ms", self.name, micros as f64 / 1000.0);
        }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        self.log_elapsed();
    }
}
