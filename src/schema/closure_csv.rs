//! Closure record ingestion
//!
//! Closure records arrive as delimited text with a header row:
//!
//! ```text
//! date,time,closedLanes,closedBlocks
//! 3/3,9:00 AM,1,2
//! ```
//!
//! Dates carry no year, so the caller supplies one. Times are local wall-clock
//! times and are converted to an epoch-hour through the configured UTC offset.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use tracing::warn;

use crate::config::MAX_CLOSED_BLOCKS;
use crate::error::ComputeError;
use crate::types::{ClosureEvent, EpochHour};

/// Adapter turning closure CSV text into ordered closure events
#[derive(Debug, Clone, Copy)]
pub struct ClosureCsvAdapter {
    year: i32,
    offset: FixedOffset,
}

impl ClosureCsvAdapter {
    /// Create an adapter for records from `year`, recorded in local `offset`
    pub fn new(year: i32, offset: FixedOffset) -> Self {
        Self { year, offset }
    }

    /// Parse CSV text into closure events ordered by hour
    pub fn parse_str(&self, text: &str) -> Result<Vec<ClosureEvent>, ComputeError> {
        self.parse_reader(text.as_bytes())
    }

    /// Parse CSV from any reader into closure events ordered by hour
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<Vec<ClosureEvent>, ComputeError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut events = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            events.push(self.parse_record(&record)?);
        }

        if events.windows(2).any(|pair| pair[0].hour > pair[1].hour) {
            warn!(
                events = events.len(),
                "closure records are not in ascending order; sorting"
            );
            events.sort_by_key(|event| event.hour);
        }

        Ok(events)
    }

    fn parse_record(&self, record: &StringRecord) -> Result<ClosureEvent, ComputeError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |index: usize, name: &str| {
            record.get(index).filter(|f| !f.is_empty()).ok_or_else(|| {
                ComputeError::ParseError(format!("line {line}: missing {name}"))
            })
        };

        let date = field(0, "date")?;
        let time = field(1, "time")?;
        let closed_lanes = parse_count(field(2, "closedLanes")?, "closedLanes", line)?;
        let closed_blocks = parse_count(field(3, "closedBlocks")?, "closedBlocks", line)?;
        if closed_blocks > MAX_CLOSED_BLOCKS {
            return Err(ComputeError::ParseError(format!(
                "line {line}: closedBlocks {closed_blocks} exceeds {MAX_CLOSED_BLOCKS}"
            )));
        }

        let local = self.parse_local(date, time).map_err(|e| {
            ComputeError::DateParseError(format!("line {line}: {e}"))
        })?;
        let hour = self.to_epoch_hour(local).ok_or_else(|| {
            ComputeError::DateParseError(format!("line {line}: {date} {time} is not representable"))
        })?;

        Ok(ClosureEvent {
            hour,
            closed_lanes,
            closed_blocks,
        })
    }

    /// Parse `M/d` and `h:mm AM` into a naive local timestamp
    fn parse_local(&self, date: &str, time: &str) -> Result<NaiveDateTime, String> {
        let date = NaiveDate::parse_from_str(&format!("{}/{}", self.year, date), "%Y/%m/%d")
            .map_err(|e| format!("bad date '{date}': {e}"))?;
        let time = NaiveTime::parse_from_str(time, "%I:%M %p")
            .map_err(|e| format!("bad time '{time}': {e}"))?;
        Ok(date.and_time(time))
    }

    fn to_epoch_hour(&self, local: NaiveDateTime) -> Option<EpochHour> {
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|at| EpochHour::from_datetime(at.with_timezone(&Utc)))
    }
}

fn parse_count(value: &str, name: &str, line: u64) -> Result<u32, ComputeError> {
    value.parse::<u32>().map_err(|e| {
        ComputeError::ParseError(format!("line {line}: bad {name} '{value}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc_adapter() -> ClosureCsvAdapter {
        ClosureCsvAdapter::new(2025, FixedOffset::east_opt(0).unwrap())
    }

    #[test]
    fn test_parse_skips_header() {
        let text = "date,time,closedLanes,closedBlocks\n3/3,9:00 AM,1,2\n3/3,1:00 PM,2,4\n";
        let events = utc_adapter().parse_str(text).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].closed_lanes, 1);
        assert_eq!(events[0].closed_blocks, 2);
        assert_eq!(events[0].hour.to_utc().hour(), 9);
        assert_eq!(events[1].hour.hours_since(events[0].hour), 4);
    }

    #[test]
    fn test_parse_handles_crlf_and_blank_lines() {
        let text = "date,time,closedLanes,closedBlocks\r\n3/3,9:00 AM,1,2\r\n\r\n";
        let events = utc_adapter().parse_str(text).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_minutes_floor_to_hour() {
        let text = "date,time,closedLanes,closedBlocks\n3/3,9:45 AM,1,1\n";
        let events = utc_adapter().parse_str(text).unwrap();
        assert_eq!(events[0].hour.to_utc().hour(), 9);
    }

    #[test]
    fn test_local_offset_applied() {
        let pacific = ClosureCsvAdapter::new(2025, FixedOffset::west_opt(8 * 3600).unwrap());
        let text = "date,time,closedLanes,closedBlocks\n3/3,9:00 AM,1,1\n";
        let events = pacific.parse_str(text).unwrap();
        assert_eq!(events[0].hour.to_utc().hour(), 17);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let text = "date,time,closedLanes,closedBlocks\n3/4,9:00 AM,1,1\n3/3,9:00 AM,2,3\n";
        let events = utc_adapter().parse_str(text).unwrap();
        assert!(events[0].hour < events[1].hour);
        assert_eq!(events[0].closed_lanes, 2);
    }

    #[test]
    fn test_bad_time_reports_line() {
        let text = "date,time,closedLanes,closedBlocks\n3/3,25:00 XM,1,1\n";
        let err = utc_adapter().parse_str(text).unwrap_err();
        assert!(matches!(err, ComputeError::DateParseError(ref msg) if msg.contains("line 2")));
    }

    #[test]
    fn test_missing_field_is_error() {
        let text = "date,time,closedLanes,closedBlocks\n3/3,9:00 AM,1\n";
        assert!(matches!(
            utc_adapter().parse_str(text),
            Err(ComputeError::ParseError(_))
        ));
    }

    #[test]
    fn test_oversized_block_count_is_rejected() {
        let text = "date,time,closedLanes,closedBlocks\n3/3,9:00 AM,1,4294967295\n";
        let err = utc_adapter().parse_str(text).unwrap_err();
        assert!(matches!(err, ComputeError::ParseError(ref msg) if msg.contains("line 2")));

        let text =
            format!("date,time,closedLanes,closedBlocks\n3/3,9:00 AM,1,{MAX_CLOSED_BLOCKS}\n");
        let events = utc_adapter().parse_str(&text).unwrap();
        assert_eq!(events[0].closed_blocks, MAX_CLOSED_BLOCKS);
    }
}
