//! Per-session callback routing.

pub mod table;

pub use table::RoutingTable;
