//! Gap imputation
//!
//! Hours the collector missed are filled with synthetic samples whose
//! duration is the historical median for that weekday, hour, and direction.
//! Synthetic samples are flagged `estimated` and real samples pass through
//! untouched.

use crate::baseline::MedianTable;
use crate::types::HourlySample;

/// Fills missing hours from a median table
pub struct GapImputer<'a> {
    medians: &'a MedianTable,
}

impl<'a> GapImputer<'a> {
    pub fn new(medians: &'a MedianTable) -> Self {
        Self { medians }
    }

    /// Return `samples` with a synthetic sample inserted at every missing hour.
    ///
    /// Input must be one direction, ordered by hour. Slots with no history get
    /// a zero duration.
    pub fn impute(&self, samples: &[HourlySample]) -> Vec<HourlySample> {
        let mut filled = Vec::with_capacity(samples.len() + missing_hours(samples));

        for (index, sample) in samples.iter().enumerate() {
            if let Some(prev) = index.checked_sub(1).map(|i| &samples[i]) {
                let gap = sample.hour.hours_since(prev.hour);
                for step in 1..gap {
                    let hour = prev.hour.offset_by(step);
                    let duration = self.medians.median_for(hour, prev.direction).unwrap_or(0.0);
                    filled.push(HourlySample::estimated(hour, prev.direction, duration));
                }
            }
            filled.push(*sample);
        }

        filled
    }
}

/// Number of hours absent between consecutive samples
pub fn missing_hours(samples: &[HourlySample]) -> usize {
    samples
        .windows(2)
        .map(|pair| (pair[1].hour.hours_since(pair[0].hour) - 1).max(0) as usize)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, EpochHour};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn monday(h: u32) -> EpochHour {
        // 2025-03-10 is a Monday
        EpochHour::from_datetime(Utc.with_ymd_and_hms(2025, 3, 10, h, 0, 0).unwrap())
    }

    fn history() -> MedianTable {
        // earlier Monday 09:00 observations: median 150
        let prior = EpochHour::from_datetime(Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap());
        let samples = vec![
            HourlySample::measured(prior, Direction::Eastbound, Some(100.0)),
            HourlySample::measured(prior.offset_by(-7 * 24), Direction::Eastbound, Some(200.0)),
        ];
        MedianTable::build(&samples, utc())
    }

    #[test]
    fn test_single_gap_filled_from_median() {
        let table = history();
        let real = vec![
            HourlySample::measured(monday(8), Direction::Eastbound, Some(120.0)),
            HourlySample::measured(monday(10), Direction::Eastbound, Some(130.0))
                .with_closure(1, 2),
        ];
        let filled = GapImputer::new(&table).impute(&real);

        assert_eq!(filled.len(), 3);
        assert_eq!(filled[0], real[0]);
        assert_eq!(filled[2], real[1]);
        assert_eq!(filled[1].hour, monday(9));
        assert_eq!(filled[1].duration_seconds, Some(150.0));
        assert!(filled[1].estimated);
        assert_eq!(filled[1].direction, Direction::Eastbound);
    }

    #[test]
    fn test_unseen_slot_defaults_to_zero() {
        let table = history();
        let real = vec![
            HourlySample::measured(monday(1), Direction::Westbound, Some(120.0)),
            HourlySample::measured(monday(4), Direction::Westbound, Some(130.0)),
        ];
        let filled = GapImputer::new(&table).impute(&real);

        assert_eq!(filled.len(), 4);
        assert!(filled[1..3]
            .iter()
            .all(|s| s.estimated && s.duration_seconds == Some(0.0)));
    }

    #[test]
    fn test_contiguous_series_unchanged() {
        let table = history();
        let real: Vec<HourlySample> = (0..5)
            .map(|h| HourlySample::measured(monday(h), Direction::Eastbound, Some(90.0)))
            .collect();
        assert_eq!(GapImputer::new(&table).impute(&real), real);
        assert_eq!(missing_hours(&real), 0);
    }

    #[test]
    fn test_length_grows_by_total_gap() {
        let table = history();
        let real: Vec<HourlySample> = [0, 3, 4, 9]
            .iter()
            .map(|&h| HourlySample::measured(monday(h), Direction::Eastbound, Some(90.0)))
            .collect();
        let filled = GapImputer::new(&table).impute(&real);

        assert_eq!(missing_hours(&real), 6);
        assert_eq!(filled.len(), real.len() + 6);
        assert!(filled.windows(2).all(|p| p[1].hour.hours_since(p[0].hour) == 1));
        assert_eq!(filled.iter().filter(|s| !s.estimated).count(), 4);
    }

    #[test]
    fn test_empty_and_single() {
        let table = history();
        assert!(GapImputer::new(&table).impute(&[]).is_empty());
        let one = vec![HourlySample::measured(monday(3), Direction::Eastbound, None)];
        assert_eq!(GapImputer::new(&table).impute(&one), one);
    }
}
