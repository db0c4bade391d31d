use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request, Url};
use std::time::Duration;
use tracing::debug;

use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, fetch_text};
use crate::services::timeseries::{TimeSeriesReader, range_query};

/// Reads CSV query results from an InfluxDB v2 `/api/v2/query` endpoint.
pub struct InfluxClient<C = ApiKey<BasicClient>> {
    http: C,
    base_url: String,
    org: String,
}

impl InfluxClient {
    /// Client authenticating with `Authorization: Token <token>`.
    pub fn new(base_url: &str, org: &str, token: &str) -> Result<Self> {
        let basic = BasicClient::with_timeouts(Duration::from_secs(10), Duration::from_secs(120))?;
        Ok(Self::with_client(ApiKey::token(basic, token)?, base_url, org))
    }
}

impl<C: HttpClient> InfluxClient<C> {
    pub fn with_client(http: C, base_url: &str, org: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            org: org.to_string(),
        }
    }

    fn query_url(&self) -> Result<Url> {
        let url = Url::parse_with_params(
            &format!("{}/api/v2/query", self.base_url),
            &[("org", self.org.as_str())],
        )
        .with_context(|| format!("invalid time-series URL {:?}", self.base_url))?;
        Ok(url)
    }

    fn build_request(&self, bucket: &str, days: u32) -> Result<Request> {
        let mut req = Request::new(Method::POST, self.query_url()?);
        let headers = req.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/vnd.flux"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/csv"));
        *req.body_mut() = Some(range_query(bucket, days).into());
        Ok(req)
    }
}

#[async_trait]
impl<C: HttpClient> TimeSeriesReader for InfluxClient<C> {
    #[tracing::instrument(skip(self), fields(org = %self.org))]
    async fn query_last_days(&self, bucket: &str, days: u32) -> Result<String> {
        let req = self.build_request(bucket, days)?;
        let body = fetch_text(&self.http, req)
            .await
            .with_context(|| format!("querying bucket {bucket:?}"))?;
        debug!(bytes = body.len(), "Query result received");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let client = InfluxClient::with_client(BasicClient::new(), "http://influx.local:8086/", "Parking Org");
        let req = client.build_request("parking_occupancy", 1).unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(
            req.url().as_str(),
            "http://influx.local:8086/api/v2/query?org=Parking+Org"
        );
        assert_eq!(req.headers()[CONTENT_TYPE], "application/vnd.flux");
        assert_eq!(req.headers()[ACCEPT], "application/csv");

        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(
            std::str::from_utf8(body).unwrap(),
            "from(bucket: \"parking_occupancy\")\n|> range(start: -1d)\n"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let client = InfluxClient::with_client(BasicClient::new(), "not a url", "org");
        assert!(client.build_request("b", 1).is_err());
    }
}
