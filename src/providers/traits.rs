//! Report fetcher trait definition

use async_trait::async_trait;
use thiserror::Error;

use super::{DateRange, ProviderDescriptor};
use crate::report::RawReportPayload;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// `body` is kept whole; the message only shows the start of it
    #[error("{url} returned HTTP {status}: {}", body_excerpt(.body))]
    Status {
        status: u16,
        url: String,
        body: String,
    },
}

/// Longest body excerpt shown in a status error, in characters
pub const BODY_EXCERPT_CHARS: usize = 200;

/// Single-line start of an error body
fn body_excerpt(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

/// Trait for retrieving one report from a provider
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Fetch the report for `range`.
    ///
    /// A body that is not JSON is not an error: it comes back as
    /// [`RawReportPayload::DecodeFailed`].
    async fn fetch(
        &self,
        provider: &ProviderDescriptor,
        range: &DateRange,
    ) -> Result<RawReportPayload, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_shows_short_bodies_whole() {
        let err = FetchError::Status {
            status: 503,
            url: "https://example.org/reports/tr_b1".to_string(),
            body: "maintenance\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "https://example.org/reports/tr_b1 returned HTTP 503: maintenance"
        );
    }

    #[test]
    fn status_message_truncates_long_bodies() {
        let page = format!("<html>\n<body>{}</body>\n</html>", "é".repeat(500));
        let err = FetchError::Status {
            status: 500,
            url: "https://example.org/reports/tr_j1".to_string(),
            body: page.clone(),
        };

        let message = err.to_string();
        assert!(!message.contains('\n'), "{message}");
        assert!(message.ends_with("..."), "{message}");
        let excerpt = message
            .strip_prefix("https://example.org/reports/tr_j1 returned HTTP 500: ")
            .expect("prefix");
        assert_eq!(excerpt.chars().count(), BODY_EXCERPT_CHARS + 3);
        assert!(excerpt.starts_with("<html> <body>é"));

        match err {
            FetchError::Status { body, .. } => assert_eq!(body, page),
            FetchError::Transport { .. } => unreachable!(),
        }
    }
}
