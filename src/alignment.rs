//! Closure reconciliation
//!
//! Closure records are sparse and irregular; samples are hourly. This module
//! merge-joins the two ordered sequences with a single forward cursor over
//! the closures, so a pass is linear in the combined length. Closures dated
//! before the first sample are skipped for good, as are closures that fall in
//! an hour with no sample: the cursor never moves backwards.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ComputeError;
use crate::store::SampleStore;
use crate::types::{ClosureEvent, ClosureUpdate, Direction, EpochHour, HourlySample};

/// Forward-only cursor over an ordered closure sequence
#[derive(Debug)]
pub struct ClosureCursor<'a> {
    events: &'a [ClosureEvent],
    position: usize,
    first_hour: EpochHour,
    skipped_before_range: usize,
    passed_unmatched: usize,
}

impl<'a> ClosureCursor<'a> {
    /// Cursor over `events` for a sample series starting at `first_hour`
    pub fn new(events: &'a [ClosureEvent], first_hour: EpochHour) -> Self {
        Self {
            events,
            position: 0,
            first_hour,
            skipped_before_range: 0,
            passed_unmatched: 0,
        }
    }

    /// Index of the next closure not yet consumed
    pub fn position(&self) -> usize {
        self.position
    }

    /// Advance to `hour` and take the closure recorded for it, if any.
    ///
    /// Hours must be requested in ascending order.
    pub fn seek(&mut self, hour: EpochHour) -> Option<ClosureEvent> {
        while let Some(event) = self.events.get(self.position) {
            if event.hour < self.first_hour {
                self.skipped_before_range += 1;
            } else if event.hour < hour {
                self.passed_unmatched += 1;
            } else {
                break;
            }
            self.position += 1;
        }

        let matched = self
            .events
            .get(self.position)
            .filter(|event| event.hour == hour)
            .copied();
        if matched.is_some() {
            self.position += 1;
        }
        matched
    }

    /// Closures that predate the first sample
    pub fn skipped_before_range(&self) -> usize {
        self.skipped_before_range
    }

    /// Closures passed over because no sample had their hour
    pub fn passed_unmatched(&self) -> usize {
        self.passed_unmatched
    }
}

/// Result of aligning one direction's closures onto its samples
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Alignment {
    /// Every input sample, with closure metadata applied
    pub samples: Vec<HourlySample>,
    /// Samples that received a closure
    pub matched: usize,
    /// Closures dropped because they predate the first sample
    pub skipped_before_range: usize,
    /// Closures dropped because no sample had their hour
    pub passed_unmatched: usize,
}

/// Apply each sample's closure, or (0, 0) when none was recorded that hour.
///
/// Both inputs must be ordered by hour.
pub fn align_closures(samples: &[HourlySample], events: &[ClosureEvent]) -> Alignment {
    let Some(first) = samples.first() else {
        return Alignment::default();
    };

    let mut cursor = ClosureCursor::new(events, first.hour);
    let mut matched = 0;
    let aligned = samples
        .iter()
        .map(|sample| match cursor.seek(sample.hour) {
            Some(event) => {
                matched += 1;
                sample.with_closure(event.closed_lanes, event.closed_blocks)
            }
            None => sample.with_closure(0, 0),
        })
        .collect();

    // anything left past the last sample was never reachable
    let trailing = events.len() - cursor.position();

    if cursor.skipped_before_range() > 0 {
        debug!(
            dropped = cursor.skipped_before_range(),
            first_hour = %first.hour,
            "closures before the first sample were dropped"
        );
    }

    Alignment {
        samples: aligned,
        matched,
        skipped_before_range: cursor.skipped_before_range(),
        passed_unmatched: cursor.passed_unmatched() + trailing,
    }
}

/// Outcome of reconciling one direction against the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub direction: Direction,
    /// Samples read from the store
    pub samples: usize,
    /// Samples that received a closure
    pub matched: usize,
    /// Updates the store accepted
    pub updated: usize,
    /// Updates the store rejected
    pub failed_updates: usize,
    /// Closures that could not be attributed to any sample
    pub dropped_closures: usize,
}

/// Align closures for one direction and write the result back.
///
/// Every sample gets an update, `(0, 0)` where no closure matched, so a rerun
/// clears stale metadata. Rejected updates are logged and skipped; only a
/// failed fetch aborts the direction.
pub fn reconcile_direction(
    store: &mut dyn SampleStore,
    direction: Direction,
    events: &[ClosureEvent],
) -> Result<ReconcileReport, ComputeError> {
    let samples = store.fetch_direction(direction)?;
    let alignment = align_closures(&samples, events);

    let mut updated = 0;
    let mut failed_updates = 0;
    for sample in &alignment.samples {
        let update = ClosureUpdate {
            closed_lanes: sample.lanes(),
            closed_blocks: sample.blocks(),
            hour: sample.hour,
            direction,
        };
        match store.update_closure(&update) {
            Ok(()) => updated += 1,
            Err(e) => {
                failed_updates += 1;
                warn!(%direction, hour = %update.hour, error = %e, "closure update failed");
            }
        }
    }

    let report = ReconcileReport {
        direction,
        samples: samples.len(),
        matched: alignment.matched,
        updated,
        failed_updates,
        dropped_closures: alignment.skipped_before_range + alignment.passed_unmatched,
    };
    info!(
        %direction,
        samples = report.samples,
        matched = report.matched,
        failed = report.failed_updates,
        dropped = report.dropped_closures,
        "reconciled closures"
    );
    Ok(report)
}
