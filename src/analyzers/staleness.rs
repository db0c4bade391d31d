//! Feed freshness classification.
//!
//! Every run classifies from scratch; no state carries between runs.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::analyzers::types::{FeedStatus, StalenessError, StalenessVerdict};
use crate::decoder::OccupancySnapshot;
use crate::parser::Reading;

#[derive(Debug, Clone, Copy)]
pub struct StalenessConfig {
    /// Ages strictly above this many minutes are stale.
    pub tolerance_minutes: f64,
    /// Gap between the two newest readings that is worth a warning.
    pub gap_warning_minutes: f64,
    pub bit_width: u32,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: 10.0,
            gap_warning_minutes: 5.0,
            bit_width: crate::decoder::DEFAULT_BIT_WIDTH,
        }
    }
}

/// Fractional minutes elapsed from `then` to `now`.
pub fn age_minutes(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / 60_000.0
}

/// Classifies a single last-seen instant.
pub fn classify(
    last_seen: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance_minutes: f64,
) -> StalenessVerdict {
    let age = age_minutes(last_seen, now);
    if age < 0.0 {
        warn!(age_minutes = age, "Newest reading is in the future, check clocks");
    }

    let status = if age > tolerance_minutes {
        FeedStatus::Stale
    } else {
        FeedStatus::Fresh
    };

    StalenessVerdict {
        last_seen,
        age_minutes: age,
        status,
        last_gap_minutes: None,
        occupied_spots: None,
    }
}

/// Classifies a query result. Input order does not matter.
///
/// # Errors
///
/// [`StalenessError::TooFewReadings`] when fewer than two readings are
/// available; the feed is never assumed fresh in that case.
pub fn evaluate(
    readings: &[Reading],
    now: DateTime<Utc>,
    config: &StalenessConfig,
) -> Result<StalenessVerdict, StalenessError> {
    if readings.len() < 2 {
        return Err(StalenessError::TooFewReadings {
            count: readings.len(),
        });
    }

    let mut ordered: Vec<&Reading> = readings.iter().collect();
    ordered.sort_by_key(|r| r.timestamp);
    let newest = ordered[ordered.len() - 1];
    let previous = ordered[ordered.len() - 2];

    let gap = age_minutes(previous.timestamp, newest.timestamp);
    if gap > config.gap_warning_minutes {
        warn!(gap_minutes = gap, "Gap detected between last two readings");
    }

    let occupied = OccupancySnapshot::from_reading(newest, config.bit_width).occupied_count();

    let mut verdict = classify(newest.timestamp, now, config.tolerance_minutes);
    verdict.last_gap_minutes = Some(gap);
    verdict.occupied_spots = Some(occupied);

    info!(
        last_seen = %verdict.last_seen,
        age_minutes = format!("{:.2}", verdict.age_minutes),
        status = ?verdict.status,
        device = %newest.device_id,
        occupied,
        "Feed classified"
    );
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    fn reading(minutes_ago: i64, value: u64) -> Reading {
        Reading {
            timestamp: now() - Duration::minutes(minutes_ago),
            device_id: "tvbox-e10-04".into(),
            encoded_value: value,
        }
    }

    #[test]
    fn test_boundary_is_fresh() {
        let at = classify(now() - Duration::minutes(10), now(), 10.0);
        assert_eq!(at.status, FeedStatus::Fresh);
        assert!((at.age_minutes - 10.0).abs() < 1e-9);

        let past = classify(now() - Duration::milliseconds(600_600), now(), 10.0);
        assert_eq!(past.status, FeedStatus::Stale);
    }

    #[test]
    fn test_monotonic_in_age() {
        let statuses: Vec<_> = (0..30)
            .map(|m| classify(now() - Duration::minutes(m), now(), 10.0).status)
            .collect();
        let first_stale = statuses.iter().position(|s| *s == FeedStatus::Stale).unwrap();
        assert_eq!(first_stale, 11);
        assert!(statuses[first_stale..].iter().all(|s| *s == FeedStatus::Stale));
    }

    #[test]
    fn test_two_rows_six_minutes_apart_is_fresh() {
        let readings = vec![reading(6, 1), reading(0, 3)];
        let verdict = evaluate(&readings, now(), &StalenessConfig::default()).unwrap();

        assert!(!verdict.is_stale());
        assert_eq!(verdict.last_gap_minutes, Some(6.0));
        assert_eq!(verdict.occupied_spots, Some(2));
    }

    #[test]
    fn test_old_feed_is_stale_regardless_of_order() {
        let readings = vec![reading(45, 1), reading(50, 1)];
        let verdict = evaluate(&readings, now(), &StalenessConfig::default()).unwrap();

        assert!(verdict.is_stale());
        assert!((verdict.age_minutes - 45.0).abs() < 1e-9);
        assert_eq!(verdict.last_seen, now() - Duration::minutes(45));
    }

    #[test]
    fn test_too_few_readings_is_unclassified() {
        let err = evaluate(&[reading(1, 1)], now(), &StalenessConfig::default()).unwrap_err();
        assert!(matches!(err, StalenessError::TooFewReadings { count: 1 }));

        let err = evaluate(&[], now(), &StalenessConfig::default()).unwrap_err();
        assert!(matches!(err, StalenessError::TooFewReadings { count: 0 }));
    }
}
