mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;

/// Sends `req` through `client` and returns the response body as text.
///
/// # Errors
///
/// Fails on transport errors and on any non-success status, carrying the
/// status code and response body in the message.
pub async fn fetch_text<C: HttpClient>(client: &C, req: reqwest::Request) -> Result<String> {
    let url = req.url().clone();
    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!(
            "{} returned status {}: {}",
            url.path(),
            status,
            body
        ));
    }

    Ok(resp.text().await?)
}
