//! Human-readable messages for the chat channel and the status breadcrumb.
//!
//! Output is deterministic for a given input: findings keep the analyzer's
//! order and the status table is always in spot order.

use chrono::{FixedOffset, NaiveDate};

use crate::analyzers::types::{AnomalyReport, DayType, StalenessVerdict};
use crate::analyzers::weekly::WeeklySummary;

const RULE: &str = "==================================================";
const THIN_RULE: &str = "--------------------------------------------------";

/// Local rendering used in alerts, e.g. `2026-10-15 08:15:00 UTC-03:00`.
pub fn local_timestamp(verdict: &StalenessVerdict, offset: FixedOffset) -> String {
    verdict
        .last_seen
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S UTC%:z")
        .to_string()
}

/// Alert text for a stale feed.
pub fn staleness_alert(verdict: &StalenessVerdict, offset: FixedOffset) -> String {
    format!(
        "Parking sensor feed is not sending data. Last data was received {:.2} minutes ago.\nLast timestamp: {}",
        verdict.age_minutes,
        local_timestamp(verdict, offset)
    )
}

fn plural(day_type: DayType) -> &'static str {
    match day_type {
        DayType::Weekday => "weekdays",
        DayType::Weekend => "weekends",
    }
}

/// Full anomaly report: verdict, statistics, flagged spots and status table.
pub fn anomaly_report(report: &AnomalyReport, source_label: &str) -> String {
    let s = &report.summary;
    let flagged: Vec<_> = report.flagged().collect();
    let mut lines = Vec::new();

    if flagged.is_empty() {
        lines.push(format!(
            "✅ ALL SPOTS NORMAL: No spots with <{:.1} hour occupation",
            report.floor_hours
        ));
    } else {
        lines.push(format!("🚨 ABNORMAL SPOTS DETECTED ({})", flagged.len()));
    }

    lines.push(format!(
        "📊 OVERALL STATISTICS for {} ({}, {}): generated by {}",
        report.date,
        report.date.format("%A"),
        report.day_type.to_string().to_lowercase(),
        source_label
    ));
    lines.push(RULE.to_string());
    lines.push(format!("Total occupied hours: {:.1}", s.total_hours));
    lines.push(format!("Average per spot: {:.1} hours", s.mean_hours));
    lines.push(format!(
        "Most occupied: spot_{} ({:.1} hours)",
        s.max_spot, s.max_hours
    ));
    lines.push(format!(
        "Least occupied: spot_{} ({:.1} hours)",
        s.min_spot, s.min_hours
    ));
    lines.push(format!(
        "Spots with <{:.1} hour: {}",
        report.floor_hours, s.low_count
    ));
    lines.push(format!(
        "Spots with statistical anomalies (|z|>{:.1}): {}",
        report.z_threshold, s.z_outliers
    ));
    lines.push(format!(
        "Compared with {} previous {}: {}",
        report.compared_dates.len(),
        plural(report.day_type),
        join_dates(&report.compared_dates)
    ));

    if !flagged.is_empty() {
        lines.push(THIN_RULE.to_string());
        for f in &flagged {
            lines.push(format!(
                "Spot {:2}: {:6.1} hours (avg: {:5.1}h, Δ: {:+.1}h [{:+.1}%]) → {}",
                f.spot,
                f.current_hours,
                f.baseline_mean,
                f.deviation(),
                f.deviation_pct(),
                f.classification.label()
            ));
        }
    }

    lines.push(THIN_RULE.to_string());
    lines.push(status_table(report));
    lines.join("\n")
}

/// Per-spot table in spot order.
pub fn status_table(report: &AnomalyReport) -> String {
    let mut rows: Vec<_> = report.findings.iter().collect();
    rows.sort_by_key(|f| f.spot);

    let mut lines = vec![format!(
        "{:>4} {:>6} {:>8} {:>7}  {}",
        "Spot", "Hours", "Hist Avg", "Z-score", "Status"
    )];
    for f in rows {
        lines.push(format!(
            "{:>4} {:>6.1} {:>8.1} {:>7.1}  {}",
            f.spot,
            f.current_hours,
            f.baseline_mean,
            f.z_score,
            f.classification.label()
        ));
    }
    lines.join("\n")
}

/// Caption sent along with the weekly dashboard image.
pub fn weekly_caption(summary: &WeeklySummary, generated: NaiveDate, source_label: &str) -> String {
    let weeks: Vec<String> = summary.weeks.iter().map(|w| w.week.to_string()).collect();
    format!(
        "Weekly Occupation Analysis Dashboard: {}, Generated {} by {}\nCompared weeks: {}",
        summary.current_week,
        generated.format("%Y-%m-%d"),
        source_label,
        weeks.join(", ")
    )
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{AnomalyFinding, Classification, FeedStatus, Summary};
    use crate::analyzers::weekly::{WeekId, WeekTotals};
    use chrono::{TimeZone, Utc};

    fn utc_minus_3() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn finding(spot: usize, current_hours: f64, classification: Classification) -> AnomalyFinding {
        AnomalyFinding {
            spot,
            current_hours,
            baseline_mean: 5.0,
            z_score: 0.0,
            classification,
        }
    }

    fn sample_report(findings: Vec<AnomalyFinding>) -> AnomalyReport {
        AnomalyReport {
            date: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            day_type: DayType::Weekday,
            compared_dates: vec![
                NaiveDate::from_ymd_opt(2026, 10, 12).unwrap(),
                NaiveDate::from_ymd_opt(2026, 10, 13).unwrap(),
            ],
            floor_hours: 1.0,
            z_threshold: 2.0,
            findings,
            summary: Summary {
                total_hours: 5.5,
                mean_hours: 2.75,
                max_spot: 1,
                max_hours: 5.0,
                min_spot: 2,
                min_hours: 0.5,
                low_count: 1,
                z_outliers: 0,
            },
        }
    }

    #[test]
    fn test_staleness_alert_text() {
        let verdict = StalenessVerdict {
            last_seen: Utc.with_ymd_and_hms(2026, 10, 15, 11, 15, 0).unwrap(),
            age_minutes: 45.0,
            status: FeedStatus::Stale,
            last_gap_minutes: Some(1.0),
            occupied_spots: Some(3),
        };

        let text = staleness_alert(&verdict, utc_minus_3());
        assert!(text.contains("45.00 minutes ago"));
        assert!(text.contains("Last timestamp: 2026-10-15 08:15:00 UTC-03:00"));
    }

    #[test]
    fn test_anomaly_report_flags_and_table() {
        let report = sample_report(vec![
            finding(2, 0.5, Classification::LowOccupation),
            finding(1, 5.0, Classification::Normal),
        ]);

        let text = anomaly_report(&report, "tv box 2");

        assert!(text.starts_with("🚨 ABNORMAL SPOTS DETECTED (1)"));
        assert!(text.contains("OVERALL STATISTICS for 2026-10-14 (Wednesday, weekday)"));
        assert!(text.contains("Total occupied hours: 5.5"));
        assert!(text.contains("Least occupied: spot_2 (0.5 hours)"));
        assert!(text.contains("Spot  2:    0.5 hours (avg:   5.0h, Δ: -4.5h [-90.0%]) → LOW OCCUPATION"));
        assert!(text.contains("Compared with 2 previous weekdays: 2026-10-12, 2026-10-13"));

        let table_start = text.find("Spot  Hours").unwrap();
        let table = &text[table_start..];
        let first = table.find("\n   1 ").unwrap();
        let second = table.find("\n   2 ").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_anomaly_report_all_normal_is_stable() {
        let report = sample_report(vec![
            finding(2, 4.0, Classification::Normal),
            finding(1, 5.0, Classification::Normal),
        ]);

        let a = anomaly_report(&report, "tv box 2");
        let b = anomaly_report(&report, "tv box 2");
        assert_eq!(a, b);
        assert!(a.starts_with("✅ ALL SPOTS NORMAL"));
        assert!(!a.contains("→"));
    }

    #[test]
    fn test_weekly_caption() {
        let summary = WeeklySummary {
            current_week: WeekId { year: 2026, week: 42 },
            weeks: vec![WeekTotals {
                week: WeekId { year: 2026, week: 41 },
                spot_hours: vec![1.0],
                hourly_hours: [0.0; 24],
            }],
            spots: 1,
        };

        let caption = weekly_caption(
            &summary,
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
            "tv box 2",
        );
        assert!(caption.starts_with("Weekly Occupation Analysis Dashboard: 2026-W42, Generated 2026-10-15"));
        assert!(caption.contains("2026-W41"));
    }
}
