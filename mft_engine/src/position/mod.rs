//! Position-level path analytics (C6): excursion tracking, target/stop
//! touch bookkeeping, and bar-age exit hazard aggregates.

pub mod exit_analytics;
pub mod path;
pub mod trading_position;
