//! Chat notification seam.
//!
//! One capability-based interface covers text and images; images come either
//! from a local file or from a remote URL the chat service fetches itself.

use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

/// Where an image to send comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Path(PathBuf),
    Url(String),
}

impl ImageSource {
    /// `http://` and `https://` prefixes are URLs; anything else is a path.
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            ImageSource::Url(source.to_string())
        } else {
            ImageSource::Path(PathBuf::from(source))
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("chat API rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("could not reach chat API: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("could not read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for NotifyError {
    /// Chat API URLs embed the bot token, so it is stripped before the error
    /// can reach a log line.
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Transport(e.without_url())
    }
}

/// Sends messages to a fixed chat destination. Implementations never retry.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<(), NotifyError>;

    async fn send_image(&self, source: &ImageSource, caption: &str) -> Result<(), NotifyError>;
}

/// A queued outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Image { source: ImageSource, caption: String },
}

/// Sends every message in order. A failed send is logged and does not stop
/// the remaining ones. Returns the number of failures.
pub async fn deliver_all<N: Notifier + ?Sized>(notifier: &N, messages: &[Outgoing]) -> usize {
    let mut failures = 0;

    for message in messages {
        let result = match message {
            Outgoing::Text(text) => notifier.send_text(text).await,
            Outgoing::Image { source, caption } => notifier.send_image(source, caption).await,
        };

        match result {
            Ok(()) => info!(kind = kind(message), "Message sent successfully"),
            Err(e) => {
                failures += 1;
                error!(kind = kind(message), error = %e, "Failed to send message");
            }
        }
    }

    failures
}

fn kind(message: &Outgoing) -> &'static str {
    match message {
        Outgoing::Text(_) => "text",
        Outgoing::Image { .. } => "image",
    }
}
