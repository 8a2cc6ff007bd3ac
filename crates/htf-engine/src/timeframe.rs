//! Timeframe identifiers and UTC bucket alignment
//!
//! All alignment math runs on UTC epoch milliseconds, never on civil
//! calendar fields, so daylight-saving transitions (which only change how
//! an instant is rendered, not the instant itself) cannot introduce gaps
//! or duplicate buckets. Any local-time meaning ("4 PM New York") must be
//! converted to UTC before this module is involved.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const MS_IN_MIN: i64 = 60_000;
pub const MS_IN_HOUR: i64 = 60 * MS_IN_MIN;
pub const MS_IN_DAY: i64 = 24 * MS_IN_HOUR;

/// Supported chart timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Timeframe {
    Min1,
    Min5,
    Min10,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Day1,
}

impl Timeframe {
    /// Returns the duration of this timeframe in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::Min1 => MS_IN_MIN,
            Timeframe::Min5 => 5 * MS_IN_MIN,
            Timeframe::Min10 => 10 * MS_IN_MIN,
            Timeframe::Min15 => 15 * MS_IN_MIN,
            Timeframe::Min30 => 30 * MS_IN_MIN,
            Timeframe::Hour1 => MS_IN_HOUR,
            Timeframe::Hour4 => 4 * MS_IN_HOUR,
            Timeframe::Day1 => MS_IN_DAY,
        }
    }

    /// Short canonical label for this timeframe.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Min5 => "5m",
            Timeframe::Min10 => "10m",
            Timeframe::Min15 => "15m",
            Timeframe::Min30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1D",
        }
    }

    /// All supported timeframes, shortest first.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::Min1,
            Timeframe::Min5,
            Timeframe::Min10,
            Timeframe::Min15,
            Timeframe::Min30,
            Timeframe::Hour1,
            Timeframe::Hour4,
            Timeframe::Day1,
        ]
    }

    /// Parse a timeframe identifier.
    ///
    /// Accepts the canonical labels plus the minute-count aliases used by
    /// systems that key hourly frames by minutes: `60m` for 1h and `240m`
    /// for 4h. `1d` is accepted alongside `1D`.
    pub fn parse(s: &str) -> Result<Timeframe, EngineError> {
        match s {
            "1m" => Ok(Timeframe::Min1),
            "5m" => Ok(Timeframe::Min5),
            "10m" => Ok(Timeframe::Min10),
            "15m" => Ok(Timeframe::Min15),
            "30m" => Ok(Timeframe::Min30),
            "1h" | "60m" => Ok(Timeframe::Hour1),
            "4h" | "240m" => Ok(Timeframe::Hour4),
            "1D" | "1d" => Ok(Timeframe::Day1),
            other => Err(EngineError::UnknownTimeframe(other.to_string())),
        }
    }

    /// Largest multiple of the duration that is ≤ `ts_ms` (bucket start).
    pub fn floor_align(&self, ts_ms: i64) -> i64 {
        ts_ms.div_euclid(self.duration_ms()) * self.duration_ms()
    }

    /// Smallest multiple of the duration that is ≥ `ts_ms`.
    pub fn ceil_align(&self, ts_ms: i64) -> i64 {
        let floored = self.floor_align(ts_ms);
        if floored == ts_ms {
            ts_ms
        } else {
            floored + self.duration_ms()
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::parse(s)
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.label().to_string()
    }
}

impl TryFrom<String> for Timeframe {
    type Error = EngineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Timeframe::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_table() {
        assert_eq!(Timeframe::Min1.duration_ms(), 60_000);
        assert_eq!(Timeframe::Min5.duration_ms(), 300_000);
        assert_eq!(Timeframe::Min30.duration_ms(), 1_800_000);
        assert_eq!(Timeframe::Hour1.duration_ms(), 3_600_000);
        assert_eq!(Timeframe::Hour4.duration_ms(), 14_400_000);
        assert_eq!(Timeframe::Day1.duration_ms(), 86_400_000);
    }

    #[test]
    fn test_minute_count_aliases() {
        assert_eq!(Timeframe::parse("60m").unwrap(), Timeframe::Hour1);
        assert_eq!(Timeframe::parse("240m").unwrap(), Timeframe::Hour4);
        assert_eq!(Timeframe::parse("1d").unwrap(), Timeframe::Day1);
    }

    #[test]
    fn test_unknown_identifier_fails() {
        let err = Timeframe::parse("7m").unwrap_err();
        assert!(matches!(err, EngineError::UnknownTimeframe(s) if s == "7m"));
    }

    #[test]
    fn test_floor_align() {
        // 2025-03-09T06:07:00Z = 1741500420000 ms
        let ts = 1_741_500_420_000;
        assert_eq!(Timeframe::Min1.floor_align(ts), ts);
        assert_eq!(Timeframe::Min5.floor_align(ts + 30_000), ts - 2 * 60_000);
        assert_eq!(
            Timeframe::Hour1.floor_align(ts),
            ts - 7 * 60_000
        );
    }

    #[test]
    fn test_ceil_align() {
        let aligned = Timeframe::Min5.floor_align(1_741_500_000_000);
        assert_eq!(Timeframe::Min5.ceil_align(aligned), aligned);
        assert_eq!(
            Timeframe::Min5.ceil_align(aligned + 1),
            aligned + Timeframe::Min5.duration_ms()
        );
    }

    #[test]
    fn test_floor_align_pre_epoch() {
        // div_euclid keeps buckets aligned for negative timestamps too
        assert_eq!(Timeframe::Min1.floor_align(-30_000), -60_000);
        assert_eq!(Timeframe::Min1.floor_align(-60_000), -60_000);
    }

    #[test]
    fn test_labels_round_trip() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::parse(tf.label()).unwrap(), *tf);
        }
    }
}
