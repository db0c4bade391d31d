//! CLI entry point for the parking health checks.
//!
//! Each subcommand is one scheduler-triggered run: freshness of the sensor
//! feed, per-spot occupancy anomalies, and the weekly dashboard. Two helper
//! subcommands send arbitrary text or images to the configured chat.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use parking_health::analyzers::anomaly::AnomalyConfig;
use parking_health::analyzers::staleness::StalenessConfig;
use parking_health::checks::{CheckError, run_anomaly, run_freshness, run_weekly};
use parking_health::config::{AnomalyCheck, FreshnessCheck, Settings, WeeklyCheck, utc_offset};
use parking_health::credentials::read_token;
use parking_health::decoder::DEFAULT_BIT_WIDTH;
use parking_health::infra::influx::InfluxClient;
use parking_health::infra::telegram::{DEFAULT_API_BASE, TelegramNotifier};
use parking_health::parser::{DEFAULT_DEVICE_COLUMN, ReadingFilter};
use parking_health::services::notifier::{ImageSource, Outgoing, deliver_all};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "parking_health")]
#[command(about = "Health checks for a parking occupancy sensor feed", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Base URL of the time-series store
    #[arg(long, global = true, env = "INFLUX_URL", default_value = "http://localhost:8086")]
    influx_url: String,

    /// Organization owning the bucket
    #[arg(long, global = true, env = "INFLUX_ORG")]
    influx_org: Option<String>,

    #[arg(long, global = true, env = "INFLUX_BUCKET", default_value = "parking_occupancy")]
    bucket: String,

    /// File holding the time-series store API token
    #[arg(long, global = true, env = "INFLUX_TOKEN_FILE", default_value = "influx_token.txt")]
    influx_token_file: PathBuf,

    /// File holding the chat bot token
    #[arg(long, global = true, env = "TELEGRAM_TOKEN_FILE", default_value = "telegram_token.txt")]
    telegram_token_file: PathBuf,

    /// Chat receiving the messages
    #[arg(long, global = true, env = "TELEGRAM_CHAT_ID", allow_hyphen_values = true)]
    chat_id: Option<String>,

    #[arg(long, global = true, env = "TELEGRAM_API_BASE", default_value = DEFAULT_API_BASE)]
    telegram_api: String,

    /// Directory for last_timestamp.txt and status_table.txt
    #[arg(long, global = true, env = "STATE_DIR", default_value = "state")]
    state_dir: PathBuf,

    #[arg(long, global = true, env = "DEVICE_COLUMN", default_value = DEFAULT_DEVICE_COLUMN)]
    device_column: String,

    /// Device ids to drop before analysis (comma separated)
    #[arg(long = "exclude-device", global = true, env = "EXCLUDE_DEVICES", value_delimiter = ',')]
    exclude_devices: Vec<String>,

    /// Only analyze readings at or after this instant (RFC 3339)
    #[arg(long, global = true)]
    start: Option<DateTime<Utc>>,

    /// Only analyze readings at or before this instant (RFC 3339)
    #[arg(long, global = true)]
    end: Option<DateTime<Utc>>,

    /// Number of spots encoded in each reading
    #[arg(long, global = true, env = "BIT_WIDTH", default_value_t = DEFAULT_BIT_WIDTH)]
    bit_width: u32,

    /// Local UTC offset in whole hours
    #[arg(long, global = true, env = "UTC_OFFSET_HOURS", default_value_t = -3, allow_negative_numbers = true)]
    utc_offset: i32,

    /// Names this host in reports
    #[arg(long, global = true, env = "SOURCE_LABEL", default_value = "parking health monitor")]
    source_label: String,

    /// Analyze and write breadcrumbs without sending anything
    #[arg(long, global = true, env = "DRY_RUN", default_value_t = false)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Alert when the newest reading is too old
    Freshness {
        /// Days of data to query
        #[arg(long, default_value_t = 1)]
        days: u32,

        /// Minutes after which the feed counts as stale
        #[arg(short, long, default_value_t = 10.0)]
        tolerance: f64,

        /// Gap between the two newest readings worth a warning, in minutes
        #[arg(long, default_value_t = 5.0)]
        gap_warning: f64,
    },
    /// Compare one day's per-spot occupied hours against recent history
    Anomaly {
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// ISO weeks of history to compare against
        #[arg(short = 'k', long, default_value_t = 3)]
        history_weeks: usize,

        /// Spots below this many occupied hours are flagged
        #[arg(long, default_value_t = 1.0)]
        floor_hours: f64,

        #[arg(long, default_value_t = 2.0)]
        z_threshold: f64,

        /// Also flag spots whose z-score exceeds the threshold
        #[arg(long, default_value_t = false)]
        z_rule: bool,

        /// Seconds each sample stands for
        #[arg(long, default_value_t = 60)]
        sample_interval: u64,

        /// Local date to analyze (defaults to the last complete day)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Also render and send a per-spot chart to this path
        #[arg(long)]
        chart: Option<PathBuf>,

        /// Only send the report when a spot is flagged
        #[arg(long, default_value_t = false)]
        alerts_only: bool,
    },
    /// Render and send the weekly occupation dashboard
    Weekly {
        #[arg(long, default_value_t = 40)]
        days: u32,

        /// Complete weeks to show
        #[arg(short, long, default_value_t = 4)]
        weeks: usize,

        #[arg(long, default_value_t = 60)]
        sample_interval: u64,

        #[arg(long, default_value = "state/weekly_dashboard.png")]
        chart: PathBuf,
    },
    /// Send a text message to the chat
    SendText {
        text: String,
    },
    /// Send an image from a file path or URL to the chat
    SendImage {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[arg(short, long, default_value = "")]
        caption: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/parking_health.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("parking_health.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let common = cli.common;

    let settings = Settings {
        bucket: common.bucket.clone(),
        device_column: common.device_column.clone(),
        filter: ReadingFilter {
            exclude_devices: common.exclude_devices.clone(),
            start: common.start,
            end: common.end,
        },
        bit_width: common.bit_width,
        offset: utc_offset(common.utc_offset)?,
        state_dir: common.state_dir.clone(),
        source_label: common.source_label.clone(),
        dry_run: common.dry_run,
    };
    info!(bucket = %settings.bucket, dry_run = settings.dry_run, "Starting run");

    let bot_token = read_token(&common.telegram_token_file)?;
    let chat_id = common
        .chat_id
        .as_deref()
        .context("--chat-id (or TELEGRAM_CHAT_ID) is required")?;
    let notifier = TelegramNotifier::new(&common.telegram_api, &bot_token, chat_id)
        .context("building chat client")?;

    let failures = match cli.command {
        Commands::Freshness {
            days,
            tolerance,
            gap_warning,
        } => {
            let reader = influx_reader(&common)?;
            let check = FreshnessCheck {
                days,
                staleness: StalenessConfig {
                    tolerance_minutes: tolerance,
                    gap_warning_minutes: gap_warning,
                    bit_width: settings.bit_width,
                },
            };
            let outcome = run_freshness(&reader, &notifier, &settings, &check, Utc::now()).await;
            finish(outcome.map(|o| o.failures))?
        }
        Commands::Anomaly {
            days,
            history_weeks,
            floor_hours,
            z_threshold,
            z_rule,
            sample_interval,
            date,
            chart,
            alerts_only,
        } => {
            let reader = influx_reader(&common)?;
            let check = AnomalyCheck {
                days,
                analysis: AnomalyConfig {
                    offset: settings.offset,
                    sample_interval: Duration::from_secs(sample_interval),
                    history_weeks,
                    floor_hours,
                    z_threshold,
                    z_rule,
                },
                target: date,
                chart,
                alerts_only,
            };
            let outcome = run_anomaly(&reader, &notifier, &settings, &check).await;
            finish(outcome.map(|o| o.failures))?
        }
        Commands::Weekly {
            days,
            weeks,
            sample_interval,
            chart,
        } => {
            let reader = influx_reader(&common)?;
            let check = WeeklyCheck {
                days,
                weeks,
                sample_interval: Duration::from_secs(sample_interval),
                chart,
            };
            let outcome = run_weekly(&reader, &notifier, &settings, &check, Utc::now()).await;
            finish(outcome.map(|o| o.failures))?
        }
        Commands::SendText { text } => deliver_all(&notifier, &[Outgoing::Text(text)]).await,
        Commands::SendImage { source, caption } => {
            let message = Outgoing::Image {
                source: ImageSource::parse(&source),
                caption,
            };
            deliver_all(&notifier, &[message]).await
        }
    };

    if failures > 0 {
        bail!("{failures} message(s) could not be delivered");
    }
    Ok(())
}

fn influx_reader(common: &CommonArgs) -> Result<InfluxClient> {
    let org = common
        .influx_org
        .as_deref()
        .context("--influx-org (or INFLUX_ORG) is required")?;
    let token = read_token(&common.influx_token_file)?;
    InfluxClient::new(&common.influx_url, org, &token)
}

/// Missing history ends the run quietly; everything else is an error.
fn finish(outcome: Result<usize, CheckError>) -> Result<usize> {
    match outcome {
        Ok(failures) => Ok(failures),
        Err(e) if e.is_benign() => {
            warn!(reason = %e, "Nothing to report");
            Ok(0)
        }
        Err(e) => {
            error!(error = %e, "Check failed");
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_negative_chat_id_and_offset() {
        let cli = Cli::try_parse_from([
            "parking_health",
            "--influx-org",
            "lab",
            "--chat-id",
            "-10042",
            "--utc-offset",
            "-5",
            "freshness",
            "--tolerance",
            "15",
        ])
        .unwrap();

        assert_eq!(cli.common.chat_id.as_deref(), Some("-10042"));
        assert_eq!(cli.common.utc_offset, -5);
        match cli.command {
            Commands::Freshness { tolerance, .. } => assert_eq!(tolerance, 15.0),
            _ => panic!("expected freshness"),
        }
    }

    #[test]
    fn test_common_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "parking_health",
            "anomaly",
            "--chat-id",
            "-10042",
            "--influx-org",
            "lab",
            "--exclude-device",
            "bench-a,bench-b",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.common.chat_id.as_deref(), Some("-10042"));
        assert_eq!(cli.common.influx_org.as_deref(), Some("lab"));
        assert_eq!(cli.common.exclude_devices, vec!["bench-a", "bench-b"]);
        assert!(cli.common.dry_run);
        assert!(matches!(cli.command, Commands::Anomaly { .. }));
    }
}
