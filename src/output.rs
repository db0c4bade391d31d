//! Breadcrumb files left between runs.
//!
//! Each file is overwritten wholesale on every run; nothing reads them back.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LAST_TIMESTAMP_FILE: &str = "last_timestamp.txt";
pub const STATUS_TABLE_FILE: &str = "status_table.txt";

fn overwrite(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating state directory {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    debug!(path = %path.display(), bytes = contents.len(), "Breadcrumb written");
    Ok(path)
}

/// Records the newest reading's instant in RFC 3339.
pub fn write_last_timestamp(dir: &Path, timestamp: DateTime<Utc>) -> Result<PathBuf> {
    overwrite(dir, LAST_TIMESTAMP_FILE, &timestamp.to_rfc3339())
}

/// Records the latest anomaly report text.
pub fn write_status_table(dir: &Path, text: &str) -> Result<PathBuf> {
    overwrite(dir, STATUS_TABLE_FILE, text)
}

/// Logs a result as pretty-printed JSON at debug level.
pub fn log_json(label: &str, value: &impl Serialize) -> Result<()> {
    debug!(label, "{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_last_timestamp_overwrites() {
        let dir = temp_dir("parking_health_test_last_ts");
        let _ = fs::remove_dir_all(&dir);

        let first = Utc.with_ymd_and_hms(2026, 10, 14, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 10, 15, 11, 30, 0).unwrap();
        write_last_timestamp(&dir, first).unwrap();
        let path = write_last_timestamp(&dir, second).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "2026-10-15T11:30:00+00:00");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_status_table_written() {
        let dir = temp_dir("parking_health_test_status");
        let _ = fs::remove_dir_all(&dir);

        write_status_table(&dir, "a much longer first report").unwrap();
        let path = write_status_table(&dir, "short").unwrap();

        assert_eq!(path.file_name().unwrap(), STATUS_TABLE_FILE);
        assert_eq!(fs::read_to_string(&path).unwrap(), "short");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_log_json_does_not_panic() {
        log_json("sample", &vec![1, 2, 3]).unwrap();
    }
}
