//! Corridor Flux - travel-time reconciliation and analytics for a road segment
//!
//! Flux tracks hourly travel-duration samples in two directions, reconciles them
//! against sparse lane-closure records, and prepares them for presentation
//! through a deterministic pipeline: closure alignment → median baselines →
//! gap imputation → run grouping → per-day selection → block aggregation →
//! report encoding.
//!
//! ## Modules
//!
//! - **Reconciliation**: merge closure records onto stored samples and write the
//!   result back through a [`SampleStore`]
//! - **Analytics**: turn the sample history into a [`CorridorReport`]

pub mod aggregate;
pub mod alignment;
pub mod baseline;
pub mod config;
pub mod encoder;
pub mod error;
pub mod imputation;
pub mod pipeline;
pub mod runs;
pub mod schema;
pub mod selection;
pub mod store;
pub mod types;

pub use config::AnalysisConfig;
pub use encoder::CorridorReport;
pub use error::ComputeError;
pub use pipeline::{analyze_corridor, reconcile_closures, CorridorProcessor};
pub use store::{MemoryStore, SampleStore};
pub use types::{ClosureEvent, Direction, EpochHour, HourMode, HourlySample};

/// Flux version embedded in all reports
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "corridor-flux";
