//! Historical median baselines
//!
//! This module builds the table of typical travel durations used to fill
//! missing hours: one median per (weekday, hour-of-day, direction) slot over
//! the full history. The table remembers a content fingerprint of the history
//! it was built from, so a cache can tell when a rebuild is due even if the
//! number of samples did not change.

use chrono::{Datelike, FixedOffset, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

use crate::types::{Direction, EpochHour, HourlySample};

/// Slot key for a median bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketKey {
    pub weekday: Weekday,
    pub hour_of_day: u32,
    pub direction: Direction,
}

impl BucketKey {
    /// Slot that `hour` falls into in local time
    pub fn for_hour(hour: EpochHour, direction: Direction, offset: FixedOffset) -> Self {
        let local = hour.to_local(offset);
        Self {
            weekday: local.weekday(),
            hour_of_day: local.hour(),
            direction,
        }
    }

    /// Short weekday name, e.g. "Mon"
    pub fn weekday_short_name(&self) -> String {
        self.weekday.to_string()
    }
}

/// Observed durations for one slot and their median
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MedianBucket {
    pub durations: Vec<f64>,
    pub median: f64,
}

/// Flattened bucket for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub weekday: String,
    pub hour_of_day: u32,
    pub direction: Direction,
    pub observations: usize,
    pub median_seconds: f64,
}

/// Median of the finite values; 0 when there are none
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// SHA-256 over every field of every sample, plus the bucketing offset
pub fn content_fingerprint(samples: &[HourlySample], offset: FixedOffset) -> String {
    let mut hasher = Sha256::new();
    hasher.update(offset.local_minus_utc().to_le_bytes());
    for sample in samples {
        hasher.update(sample.hour.0.to_le_bytes());
        hasher.update([sample.direction as u8, sample.estimated as u8]);
        match sample.duration_seconds {
            Some(d) => {
                hasher.update([1u8]);
                hasher.update(d.to_bits().to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update(sample.closed_lanes.map_or(u64::MAX, u64::from).to_le_bytes());
        hasher.update(sample.closed_blocks.map_or(u64::MAX, u64::from).to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Median durations per slot over the full sample history
#[derive(Debug, Clone)]
pub struct MedianTable {
    buckets: HashMap<BucketKey, MedianBucket>,
    samples: Vec<HourlySample>,
    offset: FixedOffset,
    fingerprint: String,
}

impl MedianTable {
    /// Build the table from every historical sample, both directions
    pub fn build(samples: &[HourlySample], offset: FixedOffset) -> Self {
        let mut buckets: HashMap<BucketKey, MedianBucket> = HashMap::new();
        for sample in samples {
            let key = BucketKey::for_hour(sample.hour, sample.direction, offset);
            let bucket = buckets.entry(key).or_default();
            if let Some(duration) = sample.numeric_duration() {
                bucket.durations.push(duration);
            }
        }
        for bucket in buckets.values_mut() {
            bucket.median = median(&bucket.durations);
        }

        Self {
            buckets,
            samples: samples.to_vec(),
            offset,
            fingerprint: content_fingerprint(samples, offset),
        }
    }

    /// Median for the slot `hour` falls into, if that slot was ever observed
    pub fn median_for(&self, hour: EpochHour, direction: Direction) -> Option<f64> {
        self.bucket(&BucketKey::for_hour(hour, direction, self.offset))
            .map(|b| b.median)
    }

    pub fn bucket(&self, key: &BucketKey) -> Option<&MedianBucket> {
        self.buckets.get(key)
    }

    /// Samples the table was built from
    pub fn samples(&self) -> &[HourlySample] {
        &self.samples
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Whether this table was built from exactly `samples` under `offset`
    pub fn is_current(&self, samples: &[HourlySample], offset: FixedOffset) -> bool {
        self.offset == offset
            && self.samples.len() == samples.len()
            && self.fingerprint == content_fingerprint(samples, offset)
    }

    /// Buckets ordered by weekday, hour, then direction
    pub fn summaries(&self) -> Vec<BucketSummary> {
        let mut keys: Vec<&BucketKey> = self.buckets.keys().collect();
        keys.sort_by_key(|k| (k.weekday.num_days_from_monday(), k.hour_of_day, k.direction));

        keys.into_iter()
            .map(|key| {
                let bucket = &self.buckets[key];
                BucketSummary {
                    weekday: key.weekday_short_name(),
                    hour_of_day: key.hour_of_day,
                    direction: key.direction,
                    observations: bucket.durations.len(),
                    median_seconds: bucket.median,
                }
            })
            .collect()
    }
}

/// Holds the most recent median table and rebuilds it when the history changes
#[derive(Debug, Clone, Default)]
pub struct MedianCache {
    table: Option<MedianTable>,
    rebuilds: usize,
}

impl MedianCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for `samples`, rebuilding if the cached one was built from other content
    pub fn table_for(&mut self, samples: &[HourlySample], offset: FixedOffset) -> &MedianTable {
        let table = match self.table.take() {
            Some(table) if table.is_current(samples, offset) => table,
            _ => {
                debug!(samples = samples.len(), "rebuilding median table");
                self.rebuilds += 1;
                MedianTable::build(samples, offset)
            }
        };
        self.table.insert(table)
    }

    /// Number of times the table has been built
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }
}
