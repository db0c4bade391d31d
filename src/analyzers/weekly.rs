//! Weekly occupation totals for the dashboard chart.

use chrono::{Datelike, FixedOffset, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::analyzers::types::AnalysisError;
use crate::decoder::OccupancySnapshot;

/// ISO week identifier, rendered as `2026-W07`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WeekId {
    pub year: i32,
    pub week: u32,
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekTotals {
    pub week: WeekId,
    pub spot_hours: Vec<f64>,
    /// Occupied hours summed over all spots, by local hour of day.
    pub hourly_hours: [f64; 24],
}

impl WeekTotals {
    fn empty(week: WeekId, spots: usize) -> Self {
        Self {
            week,
            spot_hours: vec![0.0; spots],
            hourly_hours: [0.0; 24],
        }
    }

    pub fn total_hours(&self) -> f64 {
        self.spot_hours.iter().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklySummary {
    /// Newest week present; excluded from the comparison as incomplete.
    pub current_week: WeekId,
    /// Compared weeks, oldest first.
    pub weeks: Vec<WeekTotals>,
    pub spots: usize,
}

/// Totals for the `weeks` ISO weeks preceding the newest week in the data.
///
/// # Errors
///
/// [`AnalysisError::NoReadings`] for empty input and
/// [`AnalysisError::InsufficientHistory`] when only one week is present.
pub fn summarize_weeks(
    snapshots: &[OccupancySnapshot],
    offset: FixedOffset,
    sample_interval: Duration,
    weeks: usize,
) -> Result<WeeklySummary, AnalysisError> {
    let spots = snapshots
        .iter()
        .map(|s| s.spots.len())
        .max()
        .ok_or(AnalysisError::NoReadings)?;
    let hours_per_sample = sample_interval.as_secs_f64() / 3600.0;

    let mut by_week: BTreeMap<WeekId, WeekTotals> = BTreeMap::new();
    for snap in snapshots {
        let local = snap.timestamp.with_timezone(&offset);
        let iso = local.iso_week();
        let week = WeekId {
            year: iso.year(),
            week: iso.week(),
        };

        let totals = by_week
            .entry(week)
            .or_insert_with(|| WeekTotals::empty(week, spots));
        let occupied = snap.spots.iter().filter(|&&s| s).count();
        for (total, _) in totals.spot_hours.iter_mut().zip(&snap.spots).filter(|(_, o)| **o) {
            *total += hours_per_sample;
        }
        totals.hourly_hours[local.hour() as usize] += occupied as f64 * hours_per_sample;
    }

    let current_week = *by_week.keys().next_back().ok_or(AnalysisError::NoReadings)?;
    by_week.remove(&current_week);

    let skip = by_week.len().saturating_sub(weeks);
    let selected: Vec<WeekTotals> = by_week.into_values().skip(skip).collect();
    if selected.is_empty() {
        return Err(AnalysisError::InsufficientHistory {
            target: current_week.to_string(),
        });
    }

    info!(
        current_week = %current_week,
        selected = ?selected.iter().map(|w| w.week.to_string()).collect::<Vec<_>>(),
        "Selected weeks"
    );

    Ok(WeeklySummary {
        current_week,
        weeks: selected,
        spots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snap(y: i32, m: u32, d: u32, h: u32, spots: Vec<bool>) -> OccupancySnapshot {
        OccupancySnapshot {
            timestamp: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            spots,
        }
    }

    #[test]
    fn test_week_id_display() {
        let id = WeekId { year: 2026, week: 7 };
        assert_eq!(id.to_string(), "2026-W07");
    }

    #[test]
    fn test_selects_weeks_before_current() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let first = snap(2026, 9, 7, 12, vec![true, false]);
        let snaps: Vec<_> = (0..6)
            .map(|i| OccupancySnapshot {
                timestamp: first.timestamp + chrono::Duration::weeks(i),
                spots: first.spots.clone(),
            })
            .collect();

        let summary = summarize_weeks(&snaps, utc, Duration::from_secs(3600), 4).unwrap();

        assert_eq!(summary.current_week, WeekId { year: 2026, week: 42 });
        let ids: Vec<u32> = summary.weeks.iter().map(|w| w.week.week).collect();
        assert_eq!(ids, vec![38, 39, 40, 41]);
        assert_eq!(summary.weeks[0].spot_hours, vec![1.0, 0.0]);
        assert_eq!(summary.weeks[0].hourly_hours[12], 1.0);
        assert_eq!(summary.weeks[0].total_hours(), 1.0);
    }

    #[test]
    fn test_local_offset_moves_hour_and_week() {
        // Monday 02:00 UTC is Sunday 23:00 in UTC-3, still the previous ISO week.
        let utc_minus_3 = FixedOffset::west_opt(3 * 3600).unwrap();
        let snaps = vec![
            snap(2026, 10, 12, 2, vec![true]),
            snap(2026, 10, 14, 12, vec![true]),
        ];

        let summary = summarize_weeks(&snaps, utc_minus_3, Duration::from_secs(60), 4).unwrap();

        assert_eq!(summary.weeks.len(), 1);
        assert_eq!(summary.weeks[0].week.week, 41);
        assert!(summary.weeks[0].hourly_hours[23] > 0.0);
    }

    #[test]
    fn test_single_week_is_insufficient() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let snaps = vec![snap(2026, 10, 14, 12, vec![true])];

        let err = summarize_weeks(&snaps, utc, Duration::from_secs(60), 4).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientHistory { .. }));

        let err = summarize_weeks(&[], utc, Duration::from_secs(60), 4).unwrap_err();
        assert!(matches!(err, AnalysisError::NoReadings));
    }
}
