//! Core types for the corridor pipeline
//!
//! This module defines the values that flow through every stage: hourly
//! travel-time samples, closure events, the write-back tuples handed to the
//! persistence collaborator, and the selection modes used for presentation.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ComputeError;

/// Milliseconds in one hour
pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Seconds in one hour
pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Integer timestamp truncated to whole hours since the Unix epoch.
///
/// This is the join key between samples and closure events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochHour(pub i64);

impl EpochHour {
    /// Truncate an epoch-millisecond timestamp to its hour
    pub fn from_millis(millis: i64) -> Self {
        EpochHour(millis.div_euclid(MILLIS_PER_HOUR))
    }

    /// Truncate a UTC instant to its hour
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        EpochHour(at.timestamp().div_euclid(SECONDS_PER_HOUR))
    }

    /// Start of this hour in epoch milliseconds
    pub fn to_millis(self) -> i64 {
        self.0 * MILLIS_PER_HOUR
    }

    /// Start of this hour as a UTC instant.
    ///
    /// Stored keys are range-checked when rows are parsed.
    pub fn to_utc(self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0 * SECONDS_PER_HOUR, 0).unwrap_or_default()
    }

    /// Start of this hour in the given local offset
    pub fn to_local(self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.to_utc().with_timezone(&offset)
    }

    /// The hour `hours` after this one
    pub fn offset_by(self, hours: i64) -> Self {
        EpochHour(self.0 + hours)
    }

    /// Whole hours from `earlier` to `self`
    pub fn hours_since(self, earlier: EpochHour) -> i64 {
        self.0 - earlier.0
    }
}

impl fmt::Display for EpochHour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Travel direction along the segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Eastbound,
    Westbound,
}

impl Direction {
    /// Both directions, in processing order
    pub const ALL: [Direction; 2] = [Direction::Eastbound, Direction::Westbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Eastbound => "eastbound",
            Direction::Westbound => "westbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eastbound" => Ok(Direction::Eastbound),
            "westbound" => Ok(Direction::Westbound),
            other => Err(ComputeError::ParseError(format!(
                "Unknown direction: {other}"
            ))),
        }
    }
}

/// One hourly travel-duration observation for one direction.
///
/// Persisted samples have `estimated == false`; samples synthesized by gap
/// imputation always have `estimated == true` and never reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    /// Hour the sample was taken
    pub hour: EpochHour,
    /// Direction of travel
    pub direction: Direction,
    /// Travel duration (seconds), absent when the collector returned nothing
    pub duration_seconds: Option<f64>,
    /// Lanes closed during this hour, absent until reconciled
    pub closed_lanes: Option<u32>,
    /// Blocks closed during this hour, absent until reconciled
    pub closed_blocks: Option<u32>,
    /// Whether this sample was synthesized from historical medians
    pub estimated: bool,
}

impl HourlySample {
    /// A measured sample with no closure metadata yet
    pub fn measured(hour: EpochHour, direction: Direction, duration_seconds: Option<f64>) -> Self {
        Self {
            hour,
            direction,
            duration_seconds,
            closed_lanes: None,
            closed_blocks: None,
            estimated: false,
        }
    }

    /// A synthetic sample carrying an estimated duration
    pub fn estimated(hour: EpochHour, direction: Direction, duration_seconds: f64) -> Self {
        Self {
            hour,
            direction,
            duration_seconds: Some(duration_seconds),
            closed_lanes: None,
            closed_blocks: None,
            estimated: true,
        }
    }

    /// Copy of this sample with closure metadata applied
    pub fn with_closure(self, closed_lanes: u32, closed_blocks: u32) -> Self {
        Self {
            closed_lanes: Some(closed_lanes),
            closed_blocks: Some(closed_blocks),
            ..self
        }
    }

    /// Copy of this sample with a replacement duration
    pub fn with_duration(self, duration_seconds: f64) -> Self {
        Self {
            duration_seconds: Some(duration_seconds),
            ..self
        }
    }

    /// Closed lanes, treating unreconciled samples as open
    pub fn lanes(&self) -> u32 {
        self.closed_lanes.unwrap_or(0)
    }

    /// Closed blocks, treating unreconciled samples as open
    pub fn blocks(&self) -> u32 {
        self.closed_blocks.unwrap_or(0)
    }

    /// Duration if it is a usable number
    pub fn numeric_duration(&self) -> Option<f64> {
        self.duration_seconds.filter(|d| d.is_finite())
    }
}

/// A lane-closure record for one hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureEvent {
    pub hour: EpochHour,
    pub closed_lanes: u32,
    pub closed_blocks: u32,
}

/// Closure metadata write-back for one persisted sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureUpdate {
    pub closed_lanes: u32,
    pub closed_blocks: u32,
    pub hour: EpochHour,
    pub direction: Direction,
}

/// How each calendar day's samples are reduced before presentation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HourMode {
    /// Every sample, unchanged
    #[default]
    All,
    /// The slowest sample of each day
    Slowest,
    /// The fastest sample of each day
    Fastest,
    /// Slowest minus fastest duration, one sample per day
    Difference,
}

impl HourMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HourMode::All => "all",
            HourMode::Slowest => "slowest",
            HourMode::Fastest => "fastest",
            HourMode::Difference => "difference",
        }
    }
}

impl FromStr for HourMode {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(HourMode::All),
            "slowest" => Ok(HourMode::Slowest),
            "fastest" => Ok(HourMode::Fastest),
            "difference" => Ok(HourMode::Difference),
            other => Err(ComputeError::InvalidConfig(format!(
                "Unknown hour mode: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_epoch_hour_truncates_millis() {
        let at = Utc.with_ymd_and_hms(2025, 3, 3, 9, 59, 59).unwrap();
        let hour = EpochHour::from_millis(at.timestamp_millis());
        assert_eq!(hour, EpochHour::from_datetime(at));
        assert_eq!(hour.to_utc().hour(), 9);
        assert_eq!(hour.to_utc().minute(), 0);
    }

    #[test]
    fn test_epoch_hour_negative_millis_floor() {
        assert_eq!(EpochHour::from_millis(-1), EpochHour(-1));
    }

    #[test]
    fn test_local_hour_uses_offset() {
        let hour = EpochHour::from_datetime(Utc.with_ymd_and_hms(2025, 3, 3, 17, 0, 0).unwrap());
        let pacific = FixedOffset::west_opt(8 * 3600).unwrap();
        assert_eq!(hour.to_local(pacific).hour(), 9);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("Eastbound".parse::<Direction>().unwrap(), Direction::Eastbound);
        assert!("northbound".parse::<Direction>().is_err());
    }

    #[test]
    fn test_hour_mode_parse() {
        assert_eq!("difference".parse::<HourMode>().unwrap(), HourMode::Difference);
        assert_eq!(HourMode::default(), HourMode::All);
        assert!("median".parse::<HourMode>().is_err());
    }

    #[test]
    fn test_sample_builders_do_not_alias() {
        let base = HourlySample::measured(EpochHour(10), Direction::Westbound, Some(120.0));
        let closed = base.with_closure(1, 3);
        assert_eq!(base.closed_lanes, None);
        assert_eq!(closed.lanes(), 1);
        assert_eq!(closed.blocks(), 3);
        assert_eq!(closed.with_duration(30.0).duration_seconds, Some(30.0));
    }

    #[test]
    fn test_numeric_duration_filters_nan() {
        let sample = HourlySample::measured(EpochHour(1), Direction::Eastbound, Some(f64::NAN));
        assert_eq!(sample.numeric_duration(), None);
    }
}
