//! Candle bucket widths.
//!
//! Only two widths are produced: hourly and daily. Each has a stable two-char
//! code (`"1h"`, `"1d"`) used on the CLI and in the `interval` column.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::bucket::{SECS_PER_DAY, SECS_PER_HOUR};

/// Width of a candle bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// one UTC hour
    #[serde(rename = "1h")]
    Hour,
    /// one UTC day
    #[serde(rename = "1d")]
    Day,
}

impl Interval {
    /// Code stored in the database and accepted on the command line.
    pub const fn code(self) -> &'static str {
        match self {
            Interval::Hour => "1h",
            Interval::Day => "1d",
        }
    }

    /// Bucket width in seconds.
    pub const fn width_secs(self) -> i64 {
        match self {
            Interval::Hour => SECS_PER_HOUR,
            Interval::Day => SECS_PER_DAY,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Rejected interval code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interval {0:?} (expected 1h or 1d)")]
pub struct UnknownInterval(pub String);

impl FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1h" | "hour" | "hourly" => Ok(Interval::Hour),
            "1d" | "day" | "daily" => Ok(Interval::Day),
            other => Err(UnknownInterval(other.to_string())),
        }
    }
}
