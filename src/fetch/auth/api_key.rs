use crate::fetch::client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

/// An [`HttpClient`] wrapper that injects an API key as an HTTP header.
///
/// The header name and value are validated once at construction so that
/// every request can be decorated without a fallible step.
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    value: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, value: &str) -> Result<Self> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())?;
        let mut value = HeaderValue::from_str(value)?;
        value.set_sensitive(true);
        Ok(Self {
            inner,
            header_name,
            value,
        })
    }

    /// `Authorization: Token <key>`, the scheme the time-series store expects.
    pub fn token(inner: C, key: &str) -> Result<Self> {
        Self::new(inner, "Authorization", &format!("Token {key}"))
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.value.clone());
        self.inner.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;

    #[test]
    fn test_token_header_value() {
        let client = ApiKey::token(BasicClient::new(), "secret").unwrap();
        assert_eq!(client.header_name, "authorization");
        assert_eq!(client.value.to_str().unwrap(), "Token secret");
        assert!(client.value.is_sensitive());
    }

    #[test]
    fn test_rejects_invalid_header_value() {
        assert!(ApiKey::new(BasicClient::new(), "Authorization", "bad\nvalue").is_err());
    }
}
