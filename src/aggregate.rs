//! Closure severity aggregation
//!
//! Relates the number of closed blocks to typical travel duration. Only
//! measured samples with at most one lane closed contribute, so the table
//! isolates the effect of closure length from multi-lane closures.

use serde::{Deserialize, Serialize};

use crate::baseline::median;
use crate::config::MAX_CLOSED_BLOCKS;
use crate::types::HourlySample;

/// Median duration for a block count, or no qualifying samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStat {
    MedianSeconds(f64),
    NoData,
}

impl BlockStat {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            BlockStat::MedianSeconds(s) => Some(*s),
            BlockStat::NoData => None,
        }
    }
}

/// One row of the block table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockMedian {
    pub closed_blocks: u32,
    pub samples: usize,
    pub stat: BlockStat,
}

/// Largest closed block count among the given series
pub fn max_closed_blocks<'a, I>(series: I) -> u32
where
    I: IntoIterator<Item = &'a [HourlySample]>,
{
    series
        .into_iter()
        .flat_map(|samples| samples.iter().map(HourlySample::blocks))
        .max()
        .unwrap_or(0)
}

/// Median duration for every block count in `0..=max_blocks`.
///
/// The table never extends past `MAX_CLOSED_BLOCKS`; samples above it are left out.
pub fn block_medians(samples: &[HourlySample], max_blocks: u32) -> Vec<BlockMedian> {
    let max_blocks = max_blocks.min(MAX_CLOSED_BLOCKS);
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); max_blocks as usize + 1];
    for sample in samples
        .iter()
        .filter(|s| !s.estimated && s.lanes() <= 1)
    {
        let Some(duration) = sample.numeric_duration() else {
            continue;
        };
        if let Some(bucket) = buckets.get_mut(sample.blocks() as usize) {
            bucket.push(duration);
        }
    }

    buckets
        .into_iter()
        .enumerate()
        .map(|(blocks, durations)| BlockMedian {
            closed_blocks: blocks as u32,
            samples: durations.len(),
            stat: if durations.is_empty() {
                BlockStat::NoData
            } else {
                BlockStat::MedianSeconds(median(&durations))
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, EpochHour};

    fn sample(hour: i64, duration: f64, lanes: u32, blocks: u32) -> HourlySample {
        HourlySample::measured(EpochHour(hour), Direction::Eastbound, Some(duration))
            .with_closure(lanes, blocks)
    }

    #[test]
    fn test_medians_per_block_count() {
        let samples = vec![
            sample(0, 60.0, 0, 0),
            sample(1, 70.0, 0, 0),
            sample(2, 90.0, 1, 1),
            sample(3, 110.0, 1, 1),
        ];
        let table = block_medians(&samples, 1);

        assert_eq!(table.len(), 2);
        assert_eq!(table[0].stat, BlockStat::MedianSeconds(65.0));
        assert_eq!(table[1].stat, BlockStat::MedianSeconds(100.0));
        assert_eq!(table[1].samples, 2);
    }

    #[test]
    fn test_empty_bucket_is_no_data() {
        let samples = vec![sample(0, 60.0, 1, 0), sample(1, 80.0, 1, 3)];
        let table = block_medians(&samples, 3);

        assert_eq!(table[1].stat, BlockStat::NoData);
        assert_eq!(table[2].stat, BlockStat::NoData);
        assert_eq!(table[3].stat.seconds(), Some(80.0));
    }

    #[test]
    fn test_excludes_estimated_and_multi_lane() {
        let samples = vec![
            sample(0, 60.0, 2, 1),
            HourlySample::estimated(EpochHour(1), Direction::Eastbound, 500.0),
            sample(2, 40.0, 1, 1),
        ];
        let table = block_medians(&samples, 1);

        assert_eq!(table[0].stat, BlockStat::NoData);
        assert_eq!(table[1].stat, BlockStat::MedianSeconds(40.0));
    }

    #[test]
    fn test_max_blocks_across_directions() {
        let east = vec![sample(0, 1.0, 1, 2)];
        let west = vec![sample(0, 1.0, 1, 5), sample(1, 1.0, 0, 0)];
        assert_eq!(max_closed_blocks([east.as_slice(), west.as_slice()]), 5);
        assert_eq!(max_closed_blocks(std::iter::empty::<&[HourlySample]>()), 0);
    }

    #[test]
    fn test_table_bounded_by_block_limit() {
        let samples = vec![sample(0, 60.0, 1, 2), sample(1, 90.0, 1, u32::MAX)];
        let table = block_medians(&samples, max_closed_blocks([samples.as_slice()]));

        assert_eq!(table.len(), MAX_CLOSED_BLOCKS as usize + 1);
        assert_eq!(table[2].stat.seconds(), Some(60.0));
        assert!(table[3..].iter().all(|row| row.stat == BlockStat::NoData));
    }
}
