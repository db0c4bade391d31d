//! Trait for reading recent rows from a time-series store.

use anyhow::Result;

/// Abstraction over a time-series backend (e.g., InfluxDB).
#[async_trait::async_trait]
pub trait TimeSeriesReader: Send + Sync {
    /// Runs a range query over the last `days` days of `bucket` and returns
    /// the raw CSV response body.
    async fn query_last_days(&self, bucket: &str, days: u32) -> Result<String>;
}

/// The range query sent to the store.
pub fn range_query(bucket: &str, days: u32) -> String {
    format!("from(bucket: \"{bucket}\")\n|> range(start: -{days}d)\n")
}
