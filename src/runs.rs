//! Run grouping
//!
//! Splits a sample series into maximal runs of consecutive hours that share a
//! closure severity tier or the estimated flag. Runs drive visual banding:
//! each closure run carries a coarse intensity band derived from its closed
//! block count, which selects a hatch pattern.

use serde::{Deserialize, Serialize};

use crate::config::{HEAVY_CLOSURE_LANES, LIGHT_CLOSURE_LANES};
use crate::types::{EpochHour, HourlySample};

/// Blocks per intensity band
const BLOCKS_PER_BAND: f64 = 1.7;

/// Highest intensity band that has its own pattern
pub const MAX_PATTERN_INTENSITY: u32 = 4;

/// Fill identifier for estimated runs
pub const ESTIMATED_FILL: &str = "estimated";

/// Which attribute a run groups on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunPredicate {
    /// At least `threshold` lanes closed, same block count throughout
    ClosedLanesAtLeast { threshold: u32 },
    /// Synthetic samples
    Estimated,
}

impl RunPredicate {
    /// Whether a single sample qualifies
    pub fn matches(&self, sample: &HourlySample) -> bool {
        match self {
            RunPredicate::ClosedLanesAtLeast { threshold } => sample.lanes() >= *threshold,
            RunPredicate::Estimated => sample.estimated,
        }
    }

    /// Whether `next` extends a run that ends with `prev`
    fn continues(&self, prev: &HourlySample, next: &HourlySample) -> bool {
        let contiguous = next.hour.hours_since(prev.hour) == 1;
        let same_attribute = match self {
            RunPredicate::ClosedLanesAtLeast { .. } => prev.blocks() == next.blocks(),
            RunPredicate::Estimated => prev.estimated == next.estimated,
        };
        contiguous && same_attribute && self.matches(prev) && self.matches(next)
    }
}

/// Coarse display band for a closed block count
pub fn visual_intensity(closed_blocks: u32) -> u32 {
    (closed_blocks as f64 / BLOCKS_PER_BAND).floor() as u32
}

/// Pattern identifier for a run of the given predicate and intensity
pub fn fill_pattern(predicate: RunPredicate, intensity: u32) -> String {
    let band = intensity.min(MAX_PATTERN_INTENSITY);
    match predicate {
        RunPredicate::Estimated => ESTIMATED_FILL.to_string(),
        RunPredicate::ClosedLanesAtLeast { threshold } if threshold >= HEAVY_CLOSURE_LANES => {
            format!("rightLeftHatch{band}")
        }
        RunPredicate::ClosedLanesAtLeast { .. } => format!("leftRightHatch{band}"),
    }
}

/// A maximal stretch of consecutive qualifying samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub predicate: RunPredicate,
    pub samples: Vec<HourlySample>,
    pub closed_blocks: u32,
    pub intensity: u32,
}

impl Run {
    fn start(predicate: RunPredicate, sample: HourlySample) -> Self {
        Self {
            predicate,
            samples: vec![sample],
            closed_blocks: sample.blocks(),
            intensity: visual_intensity(sample.blocks()),
        }
    }

    pub fn first_hour(&self) -> EpochHour {
        self.samples[0].hour
    }

    pub fn last_hour(&self) -> EpochHour {
        self.samples[self.samples.len() - 1].hour
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn contains(&self, hour: EpochHour) -> bool {
        hour >= self.first_hour() && hour <= self.last_hour()
    }

    pub fn fill_pattern(&self) -> String {
        fill_pattern(self.predicate, self.intensity)
    }
}

/// Partition `samples` into maximal runs under `predicate`.
///
/// Samples that do not qualify belong to no run.
pub fn group_runs(samples: &[HourlySample], predicate: RunPredicate) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut prev: Option<&HourlySample> = None;

    for sample in samples {
        if predicate.matches(sample) {
            let extends = matches!(prev, Some(p) if predicate.continues(p, sample));
            match runs.last_mut() {
                Some(run) if extends => run.samples.push(*sample),
                _ => runs.push(Run::start(predicate, *sample)),
            }
        }
        prev = Some(sample);
    }

    runs
}

/// The three groupings used for presentation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunGroups {
    /// Runs with at least one lane closed
    pub light_closures: Vec<Run>,
    /// Runs with at least two lanes closed
    pub heavy_closures: Vec<Run>,
    /// Runs of estimated samples
    pub estimated: Vec<Run>,
}

impl RunGroups {
    pub fn from_series(samples: &[HourlySample]) -> Self {
        Self {
            light_closures: group_runs(
                samples,
                RunPredicate::ClosedLanesAtLeast {
                    threshold: LIGHT_CLOSURE_LANES,
                },
            ),
            heavy_closures: group_runs(
                samples,
                RunPredicate::ClosedLanesAtLeast {
                    threshold: HEAVY_CLOSURE_LANES,
                },
            ),
            estimated: group_runs(samples, RunPredicate::Estimated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn series(closures: &[(i64, u32, u32)]) -> Vec<HourlySample> {
        closures
            .iter()
            .map(|&(h, lanes, blocks)| {
                HourlySample::measured(EpochHour(h), Direction::Eastbound, Some(60.0))
                    .with_closure(lanes, blocks)
            })
            .collect()
    }

    const ANY_CLOSURE: RunPredicate = RunPredicate::ClosedLanesAtLeast { threshold: 1 };

    #[test]
    fn test_runs_split_on_open_hour() {
        let samples = series(&[(0, 0, 0), (1, 1, 2), (2, 1, 2), (3, 0, 0), (4, 1, 2)]);
        let runs = group_runs(&samples, ANY_CLOSURE);

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[0].first_hour(), EpochHour(1));
        assert_eq!(runs[0].last_hour(), EpochHour(2));
        assert_eq!(runs[1].len(), 1);
        assert_eq!(runs[1].first_hour(), EpochHour(4));
    }

    #[test]
    fn test_runs_split_on_block_change() {
        let samples = series(&[(0, 1, 2), (1, 1, 3), (2, 1, 3)]);
        let runs = group_runs(&samples, ANY_CLOSURE);

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].closed_blocks, 2);
        assert_eq!(runs[1].closed_blocks, 3);
    }

    #[test]
    fn test_runs_split_on_time_gap() {
        let samples = series(&[(0, 1, 1), (2, 1, 1)]);
        assert_eq!(group_runs(&samples, ANY_CLOSURE).len(), 2);
    }

    #[test]
    fn test_heavy_threshold_independent() {
        let samples = series(&[(0, 2, 4), (1, 1, 4), (2, 2, 4)]);
        let light = group_runs(&samples, ANY_CLOSURE);
        let heavy = group_runs(&samples, RunPredicate::ClosedLanesAtLeast { threshold: 2 });

        assert_eq!(light.len(), 1);
        assert_eq!(light[0].len(), 3);
        assert_eq!(heavy.len(), 2);
    }

    #[test]
    fn test_estimated_runs() {
        let mut samples = series(&[(0, 0, 0), (3, 0, 0)]);
        samples.insert(1, HourlySample::estimated(EpochHour(1), Direction::Eastbound, 50.0));
        samples.insert(2, HourlySample::estimated(EpochHour(2), Direction::Eastbound, 55.0));

        let runs = group_runs(&samples, RunPredicate::Estimated);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(runs[0].fill_pattern(), ESTIMATED_FILL);
    }

    #[test]
    fn test_runs_never_overlap() {
        let samples = series(&[(0, 1, 1), (1, 1, 1), (2, 2, 1), (3, 0, 0), (4, 1, 5), (5, 1, 5)]);
        let runs = group_runs(&samples, ANY_CLOSURE);
        for pair in runs.windows(2) {
            assert!(pair[0].last_hour() < pair[1].first_hour());
        }
        let covered: usize = runs.iter().map(Run::len).sum();
        assert_eq!(covered, 5);
    }

    #[test]
    fn test_visual_intensity_bands() {
        assert_eq!(visual_intensity(0), 0);
        assert_eq!(visual_intensity(1), 0);
        assert_eq!(visual_intensity(2), 1);
        assert_eq!(visual_intensity(4), 2);
        assert_eq!(visual_intensity(6), 3);
    }

    #[test]
    fn test_fill_patterns() {
        assert_eq!(fill_pattern(ANY_CLOSURE, 1), "leftRightHatch1");
        assert_eq!(
            fill_pattern(RunPredicate::ClosedLanesAtLeast { threshold: 2 }, 9),
            "rightLeftHatch4"
        );
    }

    #[test]
    fn test_groups_from_series() {
        let samples = series(&[(0, 2, 3), (1, 2, 3), (2, 1, 3)]);
        let groups = RunGroups::from_series(&samples);
        assert_eq!(groups.light_closures.len(), 1);
        assert_eq!(groups.heavy_closures.len(), 1);
        assert_eq!(groups.heavy_closures[0].len(), 2);
        assert!(groups.estimated.is_empty());
    }
}
