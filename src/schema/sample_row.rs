//! Persisted sample rows
//!
//! The store hands back one row per collected sample. Rows are keyed by an
//! epoch-millisecond timestamp that is serialized as a string, and carry the
//! closure fields only once reconciliation has run.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::config::MAX_CLOSED_BLOCKS;
use crate::error::ComputeError;
use crate::types::{Direction, EpochHour, HourlySample};

/// One stored travel-time row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRow {
    /// Collection time in epoch milliseconds
    #[serde(deserialize_with = "string_or_number")]
    pub unix_milliseconds: String,
    /// Travel duration (seconds)
    #[serde(default)]
    pub route_seconds: Option<f64>,
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_lanes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_blocks: Option<u32>,
}

impl SampleRow {
    pub fn new(unix_milliseconds: i64, route_seconds: Option<f64>, direction: Direction) -> Self {
        Self {
            unix_milliseconds: unix_milliseconds.to_string(),
            route_seconds,
            direction,
            closed_lanes: None,
            closed_blocks: None,
        }
    }

    /// Parsed millisecond key, limited to instants chrono can represent
    pub fn millis(&self) -> Result<i64, ComputeError> {
        let millis = self.unix_milliseconds.trim().parse::<i64>().map_err(|e| {
            ComputeError::ParseError(format!(
                "bad unixMilliseconds '{}': {e}",
                self.unix_milliseconds
            ))
        })?;
        if DateTime::from_timestamp_millis(millis).is_none() {
            return Err(ComputeError::ParseError(format!(
                "unixMilliseconds out of range: {millis}"
            )));
        }
        Ok(millis)
    }

    /// Hour this row was collected in
    pub fn hour(&self) -> Result<EpochHour, ComputeError> {
        self.millis().map(EpochHour::from_millis)
    }

    /// Convert to a measured hourly sample
    pub fn to_sample(&self) -> Result<HourlySample, ComputeError> {
        if let Some(blocks) = self.closed_blocks.filter(|b| *b > MAX_CLOSED_BLOCKS) {
            return Err(ComputeError::ParseError(format!(
                "closedBlocks {blocks} exceeds {MAX_CLOSED_BLOCKS} at {}",
                self.unix_milliseconds
            )));
        }
        Ok(HourlySample {
            hour: self.hour()?,
            direction: self.direction,
            duration_seconds: self.route_seconds,
            closed_lanes: self.closed_lanes,
            closed_blocks: self.closed_blocks,
            estimated: false,
        })
    }
}

/// Adapter from stored rows to ordered per-direction sample series
pub struct SampleRowAdapter;

impl SampleRowAdapter {
    /// Parse a JSON array of rows
    pub fn parse_array(json: &str) -> Result<Vec<SampleRow>, ComputeError> {
        let rows: Vec<SampleRow> = serde_json::from_str(json)?;
        Ok(rows)
    }

    /// Ordered samples for one direction.
    ///
    /// Rows are sorted by hour; when two rows fall in the same hour the first
    /// one stored wins and the rest are dropped.
    pub fn to_series(
        rows: &[SampleRow],
        direction: Direction,
    ) -> Result<Vec<HourlySample>, ComputeError> {
        let mut samples = rows
            .iter()
            .filter(|row| row.direction == direction)
            .map(SampleRow::to_sample)
            .collect::<Result<Vec<_>, _>>()?;

        samples.sort_by_key(|s| s.hour);
        let before = samples.len();
        samples.dedup_by_key(|s| s.hour);
        if samples.len() < before {
            warn!(
                %direction,
                dropped = before - samples.len(),
                "dropped duplicate samples sharing an hour"
            );
        }

        Ok(samples)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Key {
        Text(String),
        Number(i64),
    }

    Ok(match Key::deserialize(deserializer)? {
        Key::Text(text) => text,
        Key::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MILLIS_PER_HOUR;

    #[test]
    fn test_parse_string_and_numeric_keys() {
        let json = r#"[
            {"unixMilliseconds": "7200000", "routeSeconds": 300, "direction": "eastbound"},
            {
                "unixMilliseconds": 3600500,
                "routeSeconds": 280.5,
                "direction": "westbound",
                "closedLanes": 1,
                "closedBlocks": 2
            }
        ]"#;
        let rows = SampleRowAdapter::parse_array(json).unwrap();

        assert_eq!(rows[0].hour().unwrap(), EpochHour(2));
        assert_eq!(rows[1].hour().unwrap(), EpochHour(1));
        assert_eq!(rows[1].to_sample().unwrap().lanes(), 1);
        assert!(!rows[1].to_sample().unwrap().estimated);
    }

    #[test]
    fn test_missing_route_seconds_is_absent() {
        let json = r#"[{"unixMilliseconds": "0", "routeSeconds": null, "direction": "eastbound"}]"#;
        let rows = SampleRowAdapter::parse_array(json).unwrap();
        assert_eq!(rows[0].to_sample().unwrap().duration_seconds, None);
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let rows = vec![
            SampleRow::new(3 * MILLIS_PER_HOUR, Some(30.0), Direction::Eastbound),
            SampleRow::new(MILLIS_PER_HOUR + 10, Some(10.0), Direction::Eastbound),
            SampleRow::new(MILLIS_PER_HOUR + 20, Some(11.0), Direction::Eastbound),
            SampleRow::new(2 * MILLIS_PER_HOUR, Some(99.0), Direction::Westbound),
        ];
        let series = SampleRowAdapter::to_series(&rows, Direction::Eastbound).unwrap();

        let hours: Vec<i64> = series.iter().map(|s| s.hour.0).collect();
        assert_eq!(hours, vec![1, 3]);
        assert_eq!(series[0].duration_seconds, Some(10.0));
    }

    #[test]
    fn test_bad_key_is_parse_error() {
        let rows = vec![SampleRow {
            unix_milliseconds: "soon".to_string(),
            route_seconds: None,
            direction: Direction::Eastbound,
            closed_lanes: None,
            closed_blocks: None,
        }];
        assert!(matches!(
            SampleRowAdapter::to_series(&rows, Direction::Eastbound),
            Err(ComputeError::ParseError(_))
        ));
    }

    #[test]
    fn test_out_of_range_key_is_rejected() {
        let rows = vec![SampleRow::new(i64::MAX, Some(60.0), Direction::Eastbound)];
        assert!(matches!(rows[0].hour(), Err(ComputeError::ParseError(_))));
        assert!(SampleRowAdapter::to_series(&rows, Direction::Eastbound).is_err());
    }

    #[test]
    fn test_oversized_block_count_is_rejected() {
        let mut row = SampleRow::new(0, Some(60.0), Direction::Eastbound);
        row.closed_lanes = Some(1);
        row.closed_blocks = Some(u32::MAX);
        assert!(matches!(row.to_sample(), Err(ComputeError::ParseError(_))));

        row.closed_blocks = Some(MAX_CLOSED_BLOCKS);
        assert_eq!(row.to_sample().unwrap().blocks(), MAX_CLOSED_BLOCKS);
    }
}
