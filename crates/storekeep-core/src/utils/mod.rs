//! Shared utilities: display formatting and the single-flight cell.

pub mod format;
pub mod single_flight;

pub use format::{format_optional, truncate_string};
pub use single_flight::SingleFlight;
