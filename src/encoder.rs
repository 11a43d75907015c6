//! Report encoding
//!
//! Turns per-direction analysis results into the presentation payload: samples
//! in minutes with display timestamps, speeds, run membership, and fill
//! identifiers, plus run summaries and the closed-block table.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::aggregate::BlockMedian;
use crate::config::{AnalysisConfig, AnalysisWindow};
use crate::pipeline::DirectionAnalysis;
use crate::runs::{Run, RunGroups, ESTIMATED_FILL};
use crate::types::{Direction, EpochHour, HourMode, HourlySample};
use crate::{FLUX_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Fill for hours with no closure and measured data
pub const BASE_FILL: &str = "#e8b929";

/// Display format, e.g. "Mon, Mar 3 at 9 AM"
const DISPLAY_FORMAT: &str = "%a, %b %-d at %-I %p";

/// A sample ready for charting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedSample {
    pub unix_milliseconds: i64,
    pub display_time: String,
    pub direction: Direction,
    pub duration_minutes: Option<f64>,
    pub speed_mph: Option<f64>,
    pub closed_lanes: u32,
    pub closed_blocks: u32,
    pub estimated: bool,
    /// Index into `runs.light_closures`
    pub light_run: Option<usize>,
    /// Index into `runs.heavy_closures`
    pub heavy_run: Option<usize>,
    /// Index into `runs.estimated`
    pub estimated_run: Option<usize>,
    pub fill: String,
}

/// Run bounds and styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub start_unix_milliseconds: i64,
    pub end_unix_milliseconds: i64,
    pub hours: usize,
    pub closed_blocks: u32,
    pub intensity: u32,
    pub fill: String,
}

/// Run summaries for one direction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DirectionRuns {
    pub light_closures: Vec<RunSummary>,
    pub heavy_closures: Vec<RunSummary>,
    pub estimated: Vec<RunSummary>,
}

/// Presentation data for one direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionReport {
    pub direction: Direction,
    pub imputed_hours: usize,
    pub samples: Vec<EnhancedSample>,
    pub runs: DirectionRuns,
    pub block_medians: Vec<BlockMedian>,
}

/// Complete presentation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorReport {
    pub report_version: String,
    pub producer: String,
    pub producer_version: String,
    pub report_id: String,
    pub generated_at_utc: String,
    pub mode: HourMode,
    pub window: Option<AnalysisWindow>,
    pub utc_offset_minutes: i32,
    pub max_closed_blocks: u32,
    pub directions: Vec<DirectionReport>,
}

/// Encoder for presentation reports
pub struct ReportEncoder {
    instance_id: String,
    offset: FixedOffset,
    route_miles: f64,
}

impl ReportEncoder {
    /// Create an encoder with a unique instance ID
    pub fn new(config: &AnalysisConfig) -> Self {
        Self::with_instance_id(config, Uuid::new_v4().to_string())
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(config: &AnalysisConfig, instance_id: String) -> Self {
        Self {
            instance_id,
            offset: config.offset(),
            route_miles: config.route_miles,
        }
    }

    /// Encode analysis results into a report
    pub fn encode(
        &self,
        config: &AnalysisConfig,
        max_closed_blocks: u32,
        analyses: &[DirectionAnalysis],
    ) -> CorridorReport {
        self.encode_at(config, max_closed_blocks, analyses, Utc::now())
    }

    fn encode_at(
        &self,
        config: &AnalysisConfig,
        max_closed_blocks: u32,
        analyses: &[DirectionAnalysis],
        generated_at: DateTime<Utc>,
    ) -> CorridorReport {
        CorridorReport {
            report_version: REPORT_VERSION.to_string(),
            producer: PRODUCER_NAME.to_string(),
            producer_version: FLUX_VERSION.to_string(),
            report_id: self.instance_id.clone(),
            generated_at_utc: generated_at.to_rfc3339(),
            mode: config.mode,
            window: config.window,
            utc_offset_minutes: config.utc_offset_minutes,
            max_closed_blocks,
            directions: analyses.iter().map(|a| self.encode_direction(a)).collect(),
        }
    }

    /// Presentation data for one direction
    pub fn encode_direction(&self, analysis: &DirectionAnalysis) -> DirectionReport {
        let membership = RunMembership::new(&analysis.runs);

        DirectionReport {
            direction: analysis.direction,
            imputed_hours: analysis.imputed_hours,
            samples: analysis
                .selected
                .iter()
                .map(|s| self.enhance_sample(s, &membership, &analysis.runs))
                .collect(),
            runs: DirectionRuns {
                light_closures: analysis.runs.light_closures.iter().map(summarize_run).collect(),
                heavy_closures: analysis.runs.heavy_closures.iter().map(summarize_run).collect(),
                estimated: analysis.runs.estimated.iter().map(summarize_run).collect(),
            },
            block_medians: analysis.block_medians.clone(),
        }
    }

    fn enhance_sample(
        &self,
        sample: &HourlySample,
        membership: &RunMembership,
        runs: &RunGroups,
    ) -> EnhancedSample {
        let duration_minutes = sample.numeric_duration().map(|s| s / 60.0);
        let speed_mph = duration_minutes
            .filter(|m| *m > 0.0)
            .map(|m| 60.0 / m * self.route_miles);

        let light_run = membership.light.get(&sample.hour).copied();
        let heavy_run = membership.heavy.get(&sample.hour).copied();
        let estimated_run = membership.estimated.get(&sample.hour).copied();

        let fill = if sample.estimated {
            ESTIMATED_FILL.to_string()
        } else if let Some(run) = heavy_run.and_then(|i| runs.heavy_closures.get(i)) {
            run.fill_pattern()
        } else if let Some(run) = light_run.and_then(|i| runs.light_closures.get(i)) {
            run.fill_pattern()
        } else {
            BASE_FILL.to_string()
        };

        EnhancedSample {
            unix_milliseconds: sample.hour.to_millis(),
            display_time: self.display_time(sample.hour),
            direction: sample.direction,
            duration_minutes,
            speed_mph,
            closed_lanes: sample.lanes(),
            closed_blocks: sample.blocks(),
            estimated: sample.estimated,
            light_run,
            heavy_run,
            estimated_run,
            fill,
        }
    }

    /// Local display label for an hour
    pub fn display_time(&self, hour: EpochHour) -> String {
        hour.to_local(self.offset).format(DISPLAY_FORMAT).to_string()
    }
}

fn summarize_run(run: &Run) -> RunSummary {
    RunSummary {
        start_unix_milliseconds: run.first_hour().to_millis(),
        end_unix_milliseconds: run.last_hour().to_millis(),
        hours: run.len(),
        closed_blocks: run.closed_blocks,
        intensity: run.intensity,
        fill: run.fill_pattern(),
    }
}

/// Hour → run index lookups for each grouping
struct RunMembership {
    light: HashMap<EpochHour, usize>,
    heavy: HashMap<EpochHour, usize>,
    estimated: HashMap<EpochHour, usize>,
}

impl RunMembership {
    fn new(runs: &RunGroups) -> Self {
        Self {
            light: index_hours(&runs.light_closures),
            heavy: index_hours(&runs.heavy_closures),
            estimated: index_hours(&runs.estimated),
        }
    }
}

fn index_hours(runs: &[Run]) -> HashMap<EpochHour, usize> {
    runs.iter()
        .enumerate()
        .flat_map(|(index, run)| run.samples.iter().map(move |s| (s.hour, index)))
        .collect()
}
