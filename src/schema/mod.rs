//! External data contracts
//!
//! Closure records come in as CSV text; samples come back from the store as
//! JSON rows. Both are turned into ordered, typed series here.

mod closure_csv;
mod sample_row;

pub use closure_csv::*;
pub use sample_row::*;
