//! Analysis configuration
//!
//! The selectable surface of the analytics pipeline: the date window, how each
//! day's hours are reduced, and how timestamps map onto local calendar time.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::{EpochHour, HourMode};

/// Closure severity threshold for any lane closure
pub const LIGHT_CLOSURE_LANES: u32 = 1;

/// Closure severity threshold for multi-lane closures
pub const HEAVY_CLOSURE_LANES: u32 = 2;

/// Largest closed block count accepted from closure records or stored rows
pub const MAX_CLOSED_BLOCKS: u32 = 64;

/// Length of the observed segment in miles
pub const DEFAULT_ROUTE_MILES: f64 = 1.09;

/// Largest UTC offset accepted, in minutes
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Inclusive range of local calendar dates to analyze
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether the local date of `hour` falls inside the window
    pub fn contains(&self, hour: EpochHour, offset: FixedOffset) -> bool {
        let date = hour.to_local(offset).date_naive();
        date >= self.start && date <= self.end
    }
}

/// Settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Date window; `None` analyzes everything
    pub window: Option<AnalysisWindow>,
    /// Per-day hour reduction
    pub mode: HourMode,
    /// Local time offset from UTC (minutes, east positive)
    pub utc_offset_minutes: i32,
    /// Segment length used to derive speed
    pub route_miles: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window: None,
            mode: HourMode::All,
            utc_offset_minutes: 0,
            route_miles: DEFAULT_ROUTE_MILES,
        }
    }
}

impl AnalysisConfig {
    /// Check that the settings describe a usable analysis
    pub fn validate(&self) -> Result<(), ComputeError> {
        if let Some(window) = &self.window {
            if window.start > window.end {
                return Err(ComputeError::InvalidConfig(format!(
                    "window start {} is after end {}",
                    window.start, window.end
                )));
            }
        }
        if !(self.route_miles.is_finite() && self.route_miles > 0.0) {
            return Err(ComputeError::InvalidConfig(format!(
                "route_miles must be positive, got {}",
                self.route_miles
            )));
        }
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ComputeError::InvalidConfig(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Local offset used for calendar days and hour-of-day buckets
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Whether `hour` is inside the configured window
    pub fn in_window(&self, hour: EpochHour) -> bool {
        self.window
            .map(|w| w.contains(hour, self.offset()))
            .unwrap_or(true)
    }

    /// Load configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
