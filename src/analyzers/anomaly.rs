//! Per-spot occupation analysis of one day against recent same-day-type history.
//!
//! Occupied time is counted per local calendar date. The compared history is
//! every earlier date of the same [`DayType`] inside the most recent
//! `history_weeks` ISO weeks that have data.

use chrono::{Datelike, FixedOffset, NaiveDate, Offset, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analyzers::types::{
    AnalysisError, AnomalyFinding, AnomalyReport, Classification, DailyAggregate, DayType,
    HistoricalBaseline, Summary,
};
use crate::analyzers::utility::{mean, sample_stddev, z_score};
use crate::decoder::OccupancySnapshot;

#[derive(Debug, Clone, Copy)]
pub struct AnomalyConfig {
    /// Offset defining local calendar dates.
    pub offset: FixedOffset,
    /// Time each sample stands for.
    pub sample_interval: Duration,
    pub history_weeks: usize,
    /// Spots below this many occupied hours are `LowOccupation`.
    pub floor_hours: f64,
    pub z_threshold: f64,
    /// When false, z-scores are reported but never classify a spot.
    pub z_rule: bool,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            offset: FixedOffset::west_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
            sample_interval: Duration::from_secs(60),
            history_weeks: 3,
            floor_hours: 1.0,
            z_threshold: 2.0,
            z_rule: false,
        }
    }
}

/// Buckets snapshots into per-date occupied hours.
pub fn daily_aggregates(
    snapshots: &[OccupancySnapshot],
    offset: FixedOffset,
    sample_interval: Duration,
) -> BTreeMap<NaiveDate, DailyAggregate> {
    let hours_per_sample = sample_interval.as_secs_f64() / 3600.0;
    let mut days: BTreeMap<NaiveDate, DailyAggregate> = BTreeMap::new();

    for snap in snapshots {
        let date = snap.timestamp.with_timezone(&offset).date_naive();
        days.entry(date)
            .or_insert_with(|| DailyAggregate::empty(date, snap.spots.len()))
            .add(&snap.spots, hours_per_sample);
    }

    days
}

/// The second most recent date present, i.e. the last complete day.
pub fn default_target_date(days: &BTreeMap<NaiveDate, DailyAggregate>) -> Option<NaiveDate> {
    days.keys().rev().nth(1).copied()
}

/// Earlier dates of `target`'s day type within the last `weeks` ISO weeks
/// that appear among the earlier dates.
pub fn select_history(
    dates: impl IntoIterator<Item = NaiveDate>,
    target: NaiveDate,
    weeks: usize,
) -> Vec<NaiveDate> {
    let prior: BTreeSet<NaiveDate> = dates.into_iter().filter(|d| *d < target).collect();

    let recent_weeks: BTreeSet<(i32, u32)> = prior
        .iter()
        .map(|d| (d.iso_week().year(), d.iso_week().week()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .take(weeks)
        .collect();

    let day_type = DayType::of(target);
    prior
        .into_iter()
        .filter(|d| DayType::of(*d) == day_type)
        .filter(|d| recent_weeks.contains(&(d.iso_week().year(), d.iso_week().week())))
        .collect()
}

pub fn baseline(history: &[&DailyAggregate], spots: usize) -> HistoricalBaseline {
    let mut means = Vec::with_capacity(spots);
    let mut stds = Vec::with_capacity(spots);

    for spot in 0..spots {
        let series: Vec<f64> = history
            .iter()
            .map(|day| day.hours.get(spot).copied().unwrap_or(0.0))
            .collect();
        let m = mean(&series);
        means.push(m);
        stds.push(sample_stddev(&series, m));
    }

    HistoricalBaseline {
        mean: means,
        std: stds,
    }
}

pub fn classify(current_hours: f64, z: f64, config: &AnomalyConfig) -> Classification {
    if current_hours < config.floor_hours {
        Classification::LowOccupation
    } else if config.z_rule && z > config.z_threshold {
        Classification::StatisticallyHigh
    } else if config.z_rule && z < -config.z_threshold {
        Classification::StatisticallyLow
    } else {
        Classification::Normal
    }
}

/// Sorts ascending by current hours, ties by spot number.
pub fn sort_findings(findings: &mut [AnomalyFinding]) {
    findings.sort_by(|a, b| {
        a.current_hours
            .total_cmp(&b.current_hours)
            .then(a.spot.cmp(&b.spot))
    });
}

fn summarize(hours: &[f64], findings: &[AnomalyFinding], config: &AnomalyConfig) -> Summary {
    // First occurrence wins on ties.
    let (max_idx, max_hours) = hours
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, h)| if h > best.1 { (i, h) } else { best });
    let (min_idx, min_hours) = hours
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::MAX), |best, (i, h)| if h < best.1 { (i, h) } else { best });

    Summary {
        total_hours: hours.iter().sum(),
        mean_hours: mean(hours),
        max_spot: max_idx + 1,
        max_hours: if hours.is_empty() { 0.0 } else { max_hours },
        min_spot: min_idx + 1,
        min_hours: if hours.is_empty() { 0.0 } else { min_hours },
        low_count: hours.iter().filter(|h| **h < config.floor_hours).count(),
        z_outliers: findings
            .iter()
            .filter(|f| f.z_score.abs() > config.z_threshold)
            .count(),
    }
}

/// Runs the full analysis for `target`, or for the last complete day when
/// `target` is `None`.
///
/// # Errors
///
/// - [`AnalysisError::NoReadings`] for an empty input.
/// - [`AnalysisError::NoTargetDate`] when no target is given and fewer than
///   two dates are present.
/// - [`AnalysisError::InsufficientHistory`] when no earlier date of the same
///   day type falls inside the history window.
pub fn analyze(
    snapshots: &[OccupancySnapshot],
    target: Option<NaiveDate>,
    config: &AnomalyConfig,
) -> Result<AnomalyReport, AnalysisError> {
    let spots = snapshots
        .iter()
        .map(|s| s.spots.len())
        .max()
        .ok_or(AnalysisError::NoReadings)?;

    let days = daily_aggregates(snapshots, config.offset, config.sample_interval);
    let date = match target {
        Some(date) => date,
        None => default_target_date(&days).ok_or(AnalysisError::NoTargetDate)?,
    };
    let day_type = DayType::of(date);

    let current = match days.get(&date) {
        Some(agg) => agg.clone(),
        None => {
            warn!(%date, "No readings on target date, treating every spot as unoccupied");
            DailyAggregate::empty(date, spots)
        }
    };

    let compared_dates = select_history(days.keys().copied(), date, config.history_weeks);
    info!(
        %date,
        %day_type,
        compared = compared_dates.len(),
        "Comparing against previous {}s",
        day_type.to_string().to_lowercase()
    );
    if compared_dates.is_empty() {
        return Err(AnalysisError::InsufficientHistory {
            target: format!("{date} ({day_type})"),
        });
    }

    let history: Vec<&DailyAggregate> = compared_dates.iter().filter_map(|d| days.get(d)).collect();
    let base = baseline(&history, spots);

    let mut hours = current.hours.clone();
    hours.resize(spots, 0.0);

    let mut findings: Vec<AnomalyFinding> = hours
        .iter()
        .enumerate()
        .map(|(i, &current_hours)| {
            let z = z_score(current_hours, base.mean[i], base.std[i]);
            AnomalyFinding {
                spot: i + 1,
                current_hours,
                baseline_mean: base.mean[i],
                z_score: z,
                classification: classify(current_hours, z, config),
            }
        })
        .collect();
    sort_findings(&mut findings);

    let summary = summarize(&hours, &findings, config);
    let report = AnomalyReport {
        date,
        day_type,
        compared_dates,
        floor_hours: config.floor_hours,
        z_threshold: config.z_threshold,
        findings,
        summary,
    };

    debug!(
        flagged = report.flagged().count(),
        total_hours = report.summary.total_hours,
        "Anomaly analysis complete"
    );
    Ok(report)
}
