//! Per-session allow-list filtering.

pub mod manager;
pub mod sorted_set;

pub use manager::FilterManager;
pub use sorted_set::SortedSetFilter;
