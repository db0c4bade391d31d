//! The three scheduled checks.
//!
//! Each check is one linear pass: query, parse, analyze, write breadcrumbs,
//! queue messages, deliver. Collaborators are passed in so the same code runs
//! against the live store and chat API or against test doubles.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::analyzers::anomaly::analyze;
use crate::analyzers::staleness::evaluate;
use crate::analyzers::types::{AnalysisError, AnomalyReport, StalenessError, StalenessVerdict};
use crate::analyzers::weekly::{WeeklySummary, summarize_weeks};
use crate::chart::{render_spot_comparison, render_weekly_dashboard};
use crate::config::{AnomalyCheck, FreshnessCheck, Settings, WeeklyCheck};
use crate::decoder::{OccupancySnapshot, snapshots};
use crate::output::{log_json, write_last_timestamp, write_status_table};
use crate::parser::{ParseError, Reading, parse_readings};
use crate::report::{anomaly_report, staleness_alert, weekly_caption};
use crate::services::notifier::{ImageSource, Notifier, Outgoing, deliver_all};
use crate::services::timeseries::TimeSeriesReader;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Unclassified(#[from] StalenessError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CheckError {
    /// Outcomes that end the run early without being a failure.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            CheckError::Analysis(AnalysisError::InsufficientHistory { .. })
                | CheckError::Analysis(AnalysisError::NoTargetDate)
        )
    }
}

#[derive(Debug)]
pub struct FreshnessOutcome {
    pub verdict: StalenessVerdict,
    pub sent: Vec<Outgoing>,
    pub failures: usize,
}

#[derive(Debug)]
pub struct AnomalyOutcome {
    pub report: AnomalyReport,
    pub text: String,
    pub sent: Vec<Outgoing>,
    pub failures: usize,
}

#[derive(Debug)]
pub struct WeeklyOutcome {
    pub summary: WeeklySummary,
    pub sent: Vec<Outgoing>,
    pub failures: usize,
}

async fn fetch_readings<R: TimeSeriesReader + ?Sized>(
    reader: &R,
    settings: &Settings,
    days: u32,
) -> Result<Vec<Reading>, CheckError> {
    let body = reader.query_last_days(&settings.bucket, days).await?;
    let readings = parse_readings(&body, &settings.device_column)?;
    Ok(settings.filter.apply(readings))
}

async fn fetch_snapshots<R: TimeSeriesReader + ?Sized>(
    reader: &R,
    settings: &Settings,
    days: u32,
) -> Result<Vec<OccupancySnapshot>, CheckError> {
    let readings = fetch_readings(reader, settings, days).await?;
    Ok(snapshots(&readings, settings.bit_width))
}

async fn dispatch<N: Notifier + ?Sized>(
    notifier: &N,
    settings: &Settings,
    messages: Vec<Outgoing>,
) -> (Vec<Outgoing>, usize) {
    if messages.is_empty() {
        return (messages, 0);
    }
    if settings.dry_run {
        info!(queued = messages.len(), "Dry run, not sending");
        return (messages, 0);
    }
    let failures = deliver_all(notifier, &messages).await;
    (messages, failures)
}

/// Staleness check: alert when the newest reading is older than the tolerance.
///
/// # Errors
///
/// [`CheckError::Unclassified`] when the result is too short or malformed
/// to classify; the feed is never reported fresh in that case.
#[tracing::instrument(skip_all, fields(bucket = %settings.bucket, tolerance = check.staleness.tolerance_minutes))]
pub async fn run_freshness<R, N>(
    reader: &R,
    notifier: &N,
    settings: &Settings,
    check: &FreshnessCheck,
    now: DateTime<Utc>,
) -> Result<FreshnessOutcome, CheckError>
where
    R: TimeSeriesReader + ?Sized,
    N: Notifier + ?Sized,
{
    let readings = match fetch_readings(reader, settings, check.days).await {
        Ok(readings) => readings,
        Err(CheckError::Parse(ParseError::Timestamp { value, .. })) => {
            return Err(StalenessError::UnparseableTimestamp(value).into());
        }
        Err(CheckError::Parse(e)) => return Err(StalenessError::Malformed(e.to_string()).into()),
        Err(e) => return Err(e),
    };

    let verdict = evaluate(&readings, now, &check.staleness)?;
    write_last_timestamp(&settings.state_dir, verdict.last_seen)?;
    log_json("staleness_verdict", &verdict)?;

    let mut messages = Vec::new();
    if verdict.is_stale() {
        info!("Timestamp too old, sending alert");
        messages.push(Outgoing::Text(staleness_alert(&verdict, settings.offset)));
    } else {
        info!("Timestamp is within tolerance");
    }

    let (sent, failures) = dispatch(notifier, settings, messages).await;
    Ok(FreshnessOutcome {
        verdict,
        sent,
        failures,
    })
}

/// Anomaly check: per-spot report for the target day, written to the status
/// breadcrumb and sent as text, optionally with a chart.
///
/// # Errors
///
/// [`AnalysisError::InsufficientHistory`] (benign) when there is nothing to
/// compare against, [`AnalysisError::NoReadings`] for an empty result, and
/// parse errors for malformed results.
#[tracing::instrument(skip_all, fields(bucket = %settings.bucket, days = check.days))]
pub async fn run_anomaly<R, N>(
    reader: &R,
    notifier: &N,
    settings: &Settings,
    check: &AnomalyCheck,
) -> Result<AnomalyOutcome, CheckError>
where
    R: TimeSeriesReader + ?Sized,
    N: Notifier + ?Sized,
{
    let snaps = fetch_snapshots(reader, settings, check.days).await?;
    let mut analysis = check.analysis;
    analysis.offset = settings.offset;

    let report = analyze(&snaps, check.target, &analysis)?;
    let text = anomaly_report(&report, &settings.source_label);
    write_status_table(&settings.state_dir, &text)?;
    log_json("anomaly_report", &report)?;

    let mut messages = Vec::new();
    if check.alerts_only && report.all_normal() {
        info!(date = %report.date, "All spots normal, nothing to send");
    } else {
        messages.push(Outgoing::Text(text.clone()));
        if let Some(path) = &check.chart {
            match render_spot_comparison(&report, path) {
                Ok(()) => messages.push(Outgoing::Image {
                    source: ImageSource::Path(path.clone()),
                    caption: format!("Occupied hours per spot, {}", report.date),
                }),
                Err(e) => warn!(error = %e, "Chart rendering failed, sending text only"),
            }
        }
    }

    let (sent, failures) = dispatch(notifier, settings, messages).await;
    Ok(AnomalyOutcome {
        report,
        text,
        sent,
        failures,
    })
}

/// Weekly dashboard: renders the last complete weeks and sends the image.
#[tracing::instrument(skip_all, fields(bucket = %settings.bucket, weeks = check.weeks))]
pub async fn run_weekly<R, N>(
    reader: &R,
    notifier: &N,
    settings: &Settings,
    check: &WeeklyCheck,
    now: DateTime<Utc>,
) -> Result<WeeklyOutcome, CheckError>
where
    R: TimeSeriesReader + ?Sized,
    N: Notifier + ?Sized,
{
    let snaps = fetch_snapshots(reader, settings, check.days).await?;
    let summary = summarize_weeks(&snaps, settings.offset, check.sample_interval, check.weeks)?;
    render_weekly_dashboard(&summary, &check.chart)?;

    let generated = now.with_timezone(&settings.offset).date_naive();
    let messages = vec![Outgoing::Image {
        source: ImageSource::Path(check.chart.clone()),
        caption: weekly_caption(&summary, generated, &settings.source_label),
    }];

    let (sent, failures) = dispatch(notifier, settings, messages).await;
    Ok(WeeklyOutcome {
        summary,
        sent,
        failures,
    })
}
