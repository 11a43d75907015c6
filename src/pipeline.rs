//! Pipeline orchestration
//!
//! This module provides the public API for Corridor Flux. It runs the offline
//! closure reconciliation against a store, and the analytics pipeline from raw
//! samples to a presentation report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::aggregate::{block_medians, max_closed_blocks, BlockMedian};
use crate::alignment::{reconcile_direction, ReconcileReport};
use crate::baseline::{MedianCache, MedianTable};
use crate::config::AnalysisConfig;
use crate::encoder::{CorridorReport, ReportEncoder};
use crate::error::ComputeError;
use crate::imputation::{missing_hours, GapImputer};
use crate::runs::RunGroups;
use crate::selection::HourSelector;
use crate::store::SampleStore;
use crate::types::{ClosureEvent, Direction, HourlySample};

/// Analysis results for one direction, before encoding
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionAnalysis {
    pub direction: Direction,
    /// Synthetic hours added by imputation
    pub imputed_hours: usize,
    /// Samples left after per-day selection
    pub selected: Vec<HourlySample>,
    /// Runs over the imputed, unselected series
    pub runs: RunGroups,
    pub block_medians: Vec<BlockMedian>,
}

/// Outcome of reconciling both directions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub reports: Vec<ReconcileReport>,
    /// Directions with no closure list; their stored metadata is left as is
    pub skipped: Vec<Direction>,
    /// Directions whose fetch failed, with the error message
    pub failed: Vec<(Direction, String)>,
}

/// Reconcile closures for each direction in `closures`.
///
/// A direction with no entry is not touched. A direction whose samples cannot
/// be fetched is logged and skipped; the next direction still runs. An empty
/// closure list clears the direction to `(0, 0)`.
pub fn reconcile_closures(
    store: &mut dyn SampleStore,
    closures: &BTreeMap<Direction, Vec<ClosureEvent>>,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    for direction in Direction::ALL {
        let Some(events) = closures.get(&direction) else {
            info!(%direction, "no closure list; direction left unchanged");
            summary.skipped.push(direction);
            continue;
        };
        match reconcile_direction(store, direction, events) {
            Ok(report) => summary.reports.push(report),
            Err(e) => {
                error!(%direction, error = %e, "could not reconcile closures");
                summary.failed.push((direction, e.to_string()));
            }
        }
    }
    summary
}

/// Run the analytics pipeline once over `history` and build a report.
///
/// # Example
/// ```ignore
/// let report = analyze_corridor(&samples, &AnalysisConfig::default())?;
/// ```
pub fn analyze_corridor(
    history: &[HourlySample],
    config: &AnalysisConfig,
) -> Result<CorridorReport, ComputeError> {
    let mut processor = CorridorProcessor::new(config.clone())?;
    Ok(processor.analyze(history))
}

/// Ordered, de-duplicated samples for one direction
pub fn direction_series(history: &[HourlySample], direction: Direction) -> Vec<HourlySample> {
    let mut series: Vec<HourlySample> = history
        .iter()
        .filter(|s| s.direction == direction)
        .copied()
        .collect();
    series.sort_by_key(|s| s.hour);
    series.dedup_by_key(|s| s.hour);
    series
}

/// Stateful processor that keeps the median table between runs.
///
/// The table is rebuilt only when the history it was built from changes.
pub struct CorridorProcessor {
    config: AnalysisConfig,
    medians: MedianCache,
    encoder: ReportEncoder,
}

impl CorridorProcessor {
    /// Create a processor with validated settings
    pub fn new(config: AnalysisConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        let encoder = ReportEncoder::new(&config);
        Ok(Self {
            config,
            medians: MedianCache::new(),
            encoder,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Replace the settings, keeping the median cache
    pub fn set_config(&mut self, config: AnalysisConfig) -> Result<(), ComputeError> {
        config.validate()?;
        self.encoder = ReportEncoder::new(&config);
        self.config = config;
        Ok(())
    }

    /// Median table for `history`, reusing the cached one when still current
    pub fn median_table(&mut self, history: &[HourlySample]) -> &MedianTable {
        self.medians.table_for(history, self.config.offset())
    }

    /// Times the median table has been built
    pub fn median_rebuilds(&self) -> usize {
        self.medians.rebuilds()
    }

    /// Run every stage up to encoding for both directions.
    ///
    /// Stages per direction: window filter, gap imputation, run grouping,
    /// per-day selection, block aggregation. The block table spans the
    /// largest block count seen in either direction.
    pub fn analyze_directions(
        &mut self,
        history: &[HourlySample],
    ) -> (Vec<DirectionAnalysis>, u32) {
        let offset = self.config.offset();
        let selector = HourSelector::new(self.config.mode, offset);
        let table = self.medians.table_for(history, offset);
        let imputer = GapImputer::new(table);

        let staged: Vec<(Direction, usize, RunGroups, Vec<HourlySample>)> = Direction::ALL
            .iter()
            .map(|&direction| {
                let windowed: Vec<HourlySample> = direction_series(history, direction)
                    .into_iter()
                    .filter(|s| self.config.in_window(s.hour))
                    .collect();
                let imputed_hours = missing_hours(&windowed);
                let imputed = imputer.impute(&windowed);
                let runs = RunGroups::from_series(&imputed);
                let selected = selector.select(&imputed);
                (direction, imputed_hours, runs, selected)
            })
            .collect();

        let max_blocks =
            max_closed_blocks(staged.iter().map(|(_, _, _, selected)| selected.as_slice()));

        let analyses = staged
            .into_iter()
            .map(|(direction, imputed_hours, runs, selected)| DirectionAnalysis {
                direction,
                imputed_hours,
                block_medians: block_medians(&selected, max_blocks),
                selected,
                runs,
            })
            .collect();

        (analyses, max_blocks)
    }

    /// Analyze `history` and encode the report
    pub fn analyze(&mut self, history: &[HourlySample]) -> CorridorReport {
        let (analyses, max_blocks) = self.analyze_directions(history);
        info!(
            samples = history.len(),
            mode = self.config.mode.as_str(),
            max_blocks,
            "analyzed corridor"
        );
        self.encoder.encode(&self.config, max_blocks, &analyses)
    }

    /// Fetch the full history from `store`, then analyze it
    pub fn analyze_store(
        &mut self,
        store: &mut dyn SampleStore,
    ) -> Result<CorridorReport, ComputeError> {
        let history = store.fetch_all()?;
        Ok(self.analyze(&history))
    }
}
