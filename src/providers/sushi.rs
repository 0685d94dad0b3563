//! HTTP report fetcher for SUSHI endpoints
//!
//! Issues a single GET per report. There are no retries and no timeout
//! beyond the client defaults.

use async_trait::async_trait;

use super::{redact_url, DateRange, FetchError, ProviderDescriptor, ReportFetcher};
use crate::report::RawReportPayload;

const USER_AGENT: &str = concat!("sushi-stats/", env!("CARGO_PKG_VERSION"));

pub struct SushiClient {
    client: reqwest::Client,
}

impl SushiClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_report(
        &self,
        provider: &ProviderDescriptor,
        range: &DateRange,
    ) -> Result<RawReportPayload, FetchError> {
        let url = build_request_url(&provider.base_url, range);
        let display_url = redact_url(&url);
        tracing::debug!(provider = %provider.name, "Fetching report from: {}", display_url);

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: display_url.clone(),
                source,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                provider = %provider.name,
                "HTTP {} body from {}: {}",
                status,
                display_url,
                body
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: display_url,
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: display_url,
                source,
            })?;
        tracing::trace!(provider = %provider.name, "Report response: {}", body);

        Ok(decode_payload(url, body))
    }
}

impl Default for SushiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportFetcher for SushiClient {
    async fn fetch(
        &self,
        provider: &ProviderDescriptor,
        range: &DateRange,
    ) -> Result<RawReportPayload, FetchError> {
        self.fetch_report(provider, range).await
    }
}

/// Append the date range to a provider's base query URL.
///
/// Dates are passed through verbatim.
pub fn build_request_url(base_url: &str, range: &DateRange) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!(
        "{base_url}{separator}begin_date={}&end_date={}",
        range.begin_date, range.end_date
    )
}

/// Parse a response body, keeping the raw text when it is not JSON
pub fn decode_payload(request_url: String, body: String) -> RawReportPayload {
    match serde_json::from_str(&body) {
        Ok(value) => RawReportPayload::Decoded(value),
        Err(err) => {
            tracing::warn!("Report body from {} is not JSON: {}", redact_url(&request_url), err);
            RawReportPayload::DecodeFailed { request_url, body }
        }
    }
}
