//! Data types shared by the staleness, anomaly and weekly analyzers.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Weekend vs. weekday classification of a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::Weekday => f.write_str("Weekday"),
            DayType::Weekend => f.write_str("Weekend"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedStatus {
    Fresh,
    Stale,
}

/// Result of comparing the newest reading against the current instant.
#[derive(Debug, Clone, Serialize)]
pub struct StalenessVerdict {
    pub last_seen: DateTime<Utc>,
    pub age_minutes: f64,
    pub status: FeedStatus,
    /// Minutes between the two newest readings.
    pub last_gap_minutes: Option<f64>,
    pub occupied_spots: Option<usize>,
}

impl StalenessVerdict {
    pub fn is_stale(&self) -> bool {
        self.status == FeedStatus::Stale
    }
}

/// The feed could not be classified either way.
#[derive(Debug, Error)]
pub enum StalenessError {
    #[error("unable to classify feed: {count} reading(s), at least 2 required")]
    TooFewReadings { count: usize },
    #[error("unable to classify feed: unparseable timestamp ({0})")]
    UnparseableTimestamp(String),
    #[error("unable to classify feed: malformed query result ({0})")]
    Malformed(String),
}

/// Per-spot occupied hours on one local calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub hours: Vec<f64>,
    pub samples: usize,
}

impl DailyAggregate {
    pub fn empty(date: NaiveDate, spots: usize) -> Self {
        Self {
            date,
            hours: vec![0.0; spots],
            samples: 0,
        }
    }

    pub fn add(&mut self, spots: &[bool], hours_per_sample: f64) {
        if spots.len() > self.hours.len() {
            self.hours.resize(spots.len(), 0.0);
        }
        for (total, _) in self.hours.iter_mut().zip(spots).filter(|(_, o)| **o) {
            *total += hours_per_sample;
        }
        self.samples += 1;
    }
}

/// Per-spot mean and sample standard deviation over the compared dates.
/// `std` is `None` where fewer than two dates were compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalBaseline {
    pub mean: Vec<f64>,
    pub std: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    Normal,
    LowOccupation,
    StatisticallyHigh,
    StatisticallyLow,
}

impl Classification {
    pub fn is_flagged(self) -> bool {
        self != Classification::Normal
    }

    /// Label used in the status table.
    pub fn label(self) -> &'static str {
        match self {
            Classification::Normal => "NORMAL",
            Classification::LowOccupation => "LOW OCCUPATION",
            Classification::StatisticallyHigh => "MORE OCCUPIED THAN USUAL",
            Classification::StatisticallyLow => "STAT. ABNORMAL, LOW OCCUPATION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyFinding {
    /// 1-based spot number.
    pub spot: usize,
    pub current_hours: f64,
    pub baseline_mean: f64,
    pub z_score: f64,
    pub classification: Classification,
}

impl AnomalyFinding {
    pub fn deviation(&self) -> f64 {
        self.current_hours - self.baseline_mean
    }

    /// Deviation as a percentage of the baseline, 0 when the baseline is 0.
    pub fn deviation_pct(&self) -> f64 {
        if self.baseline_mean > 0.0 {
            self.deviation() / self.baseline_mean * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_hours: f64,
    pub mean_hours: f64,
    pub max_spot: usize,
    pub max_hours: f64,
    pub min_spot: usize,
    pub min_hours: f64,
    pub low_count: usize,
    pub z_outliers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    pub date: NaiveDate,
    pub day_type: DayType,
    pub compared_dates: Vec<NaiveDate>,
    pub floor_hours: f64,
    pub z_threshold: f64,
    /// Every spot, ascending by current hours then spot number.
    pub findings: Vec<AnomalyFinding>,
    pub summary: Summary,
}

impl AnomalyReport {
    pub fn flagged(&self) -> impl Iterator<Item = &AnomalyFinding> {
        self.findings.iter().filter(|f| f.classification.is_flagged())
    }

    pub fn all_normal(&self) -> bool {
        self.flagged().next().is_none()
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no readings in query result")]
    NoReadings,
    #[error("not enough dates to pick a complete day for comparison")]
    NoTargetDate,
    #[error("not enough historical data to compare {target}")]
    InsufficientHistory { target: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_type() {
        // 2026-10-17 is a Saturday
        let sat = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(DayType::of(sat), DayType::Weekend);
        assert_eq!(DayType::of(sat.succ_opt().unwrap()), DayType::Weekend);
        assert_eq!(DayType::of(sat.pred_opt().unwrap()), DayType::Weekday);
    }

    #[test]
    fn test_deviation_pct_zero_baseline() {
        let finding = AnomalyFinding {
            spot: 1,
            current_hours: 2.0,
            baseline_mean: 0.0,
            z_score: 0.0,
            classification: Classification::Normal,
        };
        assert_eq!(finding.deviation(), 2.0);
        assert_eq!(finding.deviation_pct(), 0.0);
    }

    #[test]
    fn test_daily_aggregate_add() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let mut agg = DailyAggregate::empty(date, 3);
        agg.add(&[true, false, true], 0.5);
        agg.add(&[true, false, false], 0.5);

        assert_eq!(agg.hours, vec![1.0, 0.0, 0.5]);
        assert_eq!(agg.samples, 2);
    }
}
