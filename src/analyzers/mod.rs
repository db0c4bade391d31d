//! Occupancy feed analysis.
//!
//! [`staleness`] classifies how old the newest reading is, [`anomaly`]
//! compares one day's per-spot occupied hours against recent history of the
//! same day type, and [`weekly`] totals the last complete weeks for the
//! dashboard chart.

pub mod anomaly;
pub mod staleness;
pub mod types;
pub mod utility;
pub mod weekly;
