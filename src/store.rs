//! Sample persistence
//!
//! The pipeline reads samples from, and writes closure metadata back to, a
//! store it does not own. `SampleStore` is that seam. `MemoryStore` keeps the
//! rows in memory and can be loaded from and saved to a JSON file holding the
//! same rows the collector's HTTP surface serves.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ComputeError;
use crate::schema::{SampleRow, SampleRowAdapter};
use crate::types::{ClosureUpdate, Direction, EpochHour, HourlySample};

/// Persistence collaborator for hourly samples
pub trait SampleStore {
    /// Ordered samples for one direction
    fn fetch_direction(&mut self, direction: Direction) -> Result<Vec<HourlySample>, ComputeError>;

    /// Every stored sample, both directions
    fn fetch_all(&mut self) -> Result<Vec<HourlySample>, ComputeError> {
        let mut all = Vec::new();
        for direction in Direction::ALL {
            all.extend(self.fetch_direction(direction)?);
        }
        Ok(all)
    }

    /// Write closure metadata for the sample at (hour, direction)
    fn update_closure(&mut self, update: &ClosureUpdate) -> Result<(), ComputeError>;
}

/// In-memory row store, indexed by (hour, direction) for closure updates
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Vec<SampleRow>,
    index: HashMap<(EpochHour, Direction), Vec<usize>>,
}

impl MemoryStore {
    /// Wrap `rows`. Rows with an unusable key are kept but cannot be updated;
    /// reading them back reports the parse error.
    pub fn new(rows: Vec<SampleRow>) -> Self {
        let mut index: HashMap<(EpochHour, Direction), Vec<usize>> = HashMap::new();
        for (position, row) in rows.iter().enumerate() {
            if let Ok(hour) = row.hour() {
                index.entry((hour, row.direction)).or_default().push(position);
            }
        }
        Self { rows, index }
    }

    /// Parse rows from a JSON array
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(Self::new(SampleRowAdapter::parse_array(json)?))
    }

    /// Serialize rows to a JSON array
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }

    /// Load rows from a JSON file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save rows to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ComputeError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }
}

impl SampleStore for MemoryStore {
    fn fetch_direction(&mut self, direction: Direction) -> Result<Vec<HourlySample>, ComputeError> {
        SampleRowAdapter::to_series(&self.rows, direction)
    }

    fn update_closure(&mut self, update: &ClosureUpdate) -> Result<(), ComputeError> {
        let positions = self
            .index
            .get(&(update.hour, update.direction))
            .ok_or_else(|| {
                ComputeError::StoreError(format!(
                    "no {} sample at hour {}",
                    update.direction, update.hour
                ))
            })?;

        for &position in positions {
            let row = &mut self.rows[position];
            row.closed_lanes = Some(update.closed_lanes);
            row.closed_blocks = Some(update.closed_blocks);
        }
        Ok(())
    }
}
