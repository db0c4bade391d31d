//! Run configuration passed explicitly into every check.

use anyhow::{Result, anyhow};
use chrono::{FixedOffset, NaiveDate};
use std::path::PathBuf;
use std::time::Duration;

use crate::analyzers::anomaly::AnomalyConfig;
use crate::analyzers::staleness::StalenessConfig;
use crate::parser::ReadingFilter;

/// Settings shared by every check.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bucket: String,
    /// Tag column naming the sending device.
    pub device_column: String,
    pub filter: ReadingFilter,
    pub bit_width: u32,
    /// Offset used for local dates, hours and displayed timestamps.
    pub offset: FixedOffset,
    /// Directory receiving the breadcrumb files.
    pub state_dir: PathBuf,
    /// Names the reporting host in messages.
    pub source_label: String,
    /// Analyze and write breadcrumbs, but send nothing.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FreshnessCheck {
    pub days: u32,
    pub staleness: StalenessConfig,
}

#[derive(Debug, Clone)]
pub struct AnomalyCheck {
    pub days: u32,
    pub analysis: AnomalyConfig,
    /// Defaults to the last complete day in the data.
    pub target: Option<NaiveDate>,
    /// Also render and send a per-spot chart to this path.
    pub chart: Option<PathBuf>,
    /// Only send the report when a spot is flagged.
    pub alerts_only: bool,
}

#[derive(Debug, Clone)]
pub struct WeeklyCheck {
    pub days: u32,
    pub weeks: usize,
    pub sample_interval: Duration,
    pub chart: PathBuf,
}

/// Fixed offset from whole hours east of UTC (`-3` for UTC-3).
pub fn utc_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| anyhow!("UTC offset out of range: {hours} hours"))
}
