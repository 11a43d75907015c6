//! Per-day hour selection
//!
//! Groups a direction's samples by local calendar day and reduces each day
//! according to the chosen [`HourMode`].

use chrono::{FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{HourMode, HourlySample};

/// Reduces each day's samples under one mode
#[derive(Debug, Clone, Copy)]
pub struct HourSelector {
    mode: HourMode,
    offset: FixedOffset,
}

impl HourSelector {
    pub fn new(mode: HourMode, offset: FixedOffset) -> Self {
        Self { mode, offset }
    }

    pub fn mode(&self) -> HourMode {
        self.mode
    }

    /// Apply the mode to every day, in day order.
    ///
    /// Days with no numeric duration produce nothing under the reducing modes.
    pub fn select(&self, samples: &[HourlySample]) -> Vec<HourlySample> {
        let days = group_by_day(samples, self.offset);
        let mut selected = Vec::with_capacity(match self.mode {
            HourMode::All => samples.len(),
            _ => days.len(),
        });

        for (date, day) in days {
            if self.mode != HourMode::All && !day.iter().any(|s| s.numeric_duration().is_some()) {
                debug!(%date, mode = self.mode.as_str(), "day has no durations; skipped");
                continue;
            }
            match self.mode {
                HourMode::All => selected.extend(day),
                HourMode::Slowest => selected.extend(slowest(&day).copied()),
                HourMode::Fastest => selected.extend(fastest(&day).copied()),
                HourMode::Difference => selected.extend(difference(&day)),
            }
        }

        selected
    }
}

/// Samples grouped by local calendar date, each group in input order
pub fn group_by_day(
    samples: &[HourlySample],
    offset: FixedOffset,
) -> BTreeMap<NaiveDate, Vec<HourlySample>> {
    let mut days: BTreeMap<NaiveDate, Vec<HourlySample>> = BTreeMap::new();
    for sample in samples {
        let date = sample.hour.to_local(offset).date_naive();
        days.entry(date).or_default().push(*sample);
    }
    days
}

/// First sample with the longest duration
pub fn slowest(day: &[HourlySample]) -> Option<&HourlySample> {
    pick(day, |candidate, best| candidate > best)
}

/// First sample with the shortest duration
pub fn fastest(day: &[HourlySample]) -> Option<&HourlySample> {
    pick(day, |candidate, best| candidate < best)
}

/// One sample carrying the slowest sample's closure data and the spread of the day
pub fn difference(day: &[HourlySample]) -> Option<HourlySample> {
    let slow = slowest(day)?;
    let fast = fastest(day)?;
    let spread = slow.numeric_duration()? - fast.numeric_duration()?;
    Some(slow.with_duration(spread))
}

// Ties keep the earlier sample: replacement needs a strict improvement.
fn pick(day: &[HourlySample], better: impl Fn(f64, f64) -> bool) -> Option<&HourlySample> {
    let mut best: Option<(&HourlySample, f64)> = None;
    for sample in day {
        let Some(duration) = sample.numeric_duration() else {
            continue;
        };
        match best {
            Some((_, best_duration)) if !better(duration, best_duration) => {}
            _ => best = Some((sample, duration)),
        }
    }
    best.map(|(sample, _)| sample)
}
