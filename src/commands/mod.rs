//! Per-category report runs
//!
//! Each provider goes through fetch then summarize on its own; the outcome
//! of one provider never affects another unless the run is fail-fast.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::providers::{Category, DateRange, ProviderDescriptor, ReportFetcher};
use crate::report::{self, AggregateResult, RawReportPayload};

/// Result for a single provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Total(u64),
    NoData,
    /// Body was not JSON; shown to users as "no stats" plus diagnostics
    DecodeFailed { request_url: String, body: String },
    /// Transport or schema fault isolated to this provider
    Failed(String),
}

impl ProviderOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            ProviderOutcome::Total(_) => "total",
            ProviderOutcome::NoData => "no_data",
            ProviderOutcome::DecodeFailed { .. } => "decode_failed",
            ProviderOutcome::Failed(_) => "error",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProviderOutcome::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct ProviderReport {
    pub provider: String,
    pub category: Category,
    pub outcome: ProviderOutcome,
    pub fetched_at: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Fetch every provider of the category concurrently
    pub parallel: bool,
    /// Abort on the first provider fault instead of recording it
    pub fail_fast: bool,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("{provider}: {message}")]
    Aborted { provider: String, message: String },
    #[error("report task for {provider} did not complete: {message}")]
    Join { provider: String, message: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload<'a> {
    pub provider: &'a str,
    pub category: Category,
    pub begin_date: &'a str,
    pub end_date: &'a str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub fetched_at: &'a str,
}

impl ProviderReport {
    pub fn payload<'a>(&'a self, range: &'a DateRange) -> ReportPayload<'a> {
        ReportPayload {
            provider: &self.provider,
            category: self.category,
            begin_date: &range.begin_date,
            end_date: &range.end_date,
            status: self.outcome.status(),
            total: match self.outcome {
                ProviderOutcome::Total(total) => Some(total),
                _ => None,
            },
            error: match &self.outcome {
                ProviderOutcome::Failed(message) => Some(message.as_str()),
                _ => None,
            },
            fetched_at: &self.fetched_at,
        }
    }

    /// Console lines for this provider; decode failures are preceded by the
    /// request URI and raw body
    pub fn text_lines(&self) -> Vec<String> {
        match &self.outcome {
            ProviderOutcome::Total(total) => vec![format!("{}: {}", self.provider, total)],
            ProviderOutcome::NoData => vec![no_stats_line(&self.provider)],
            ProviderOutcome::DecodeFailed { request_url, body } => vec![
                request_url.clone(),
                body.clone(),
                no_stats_line(&self.provider),
            ],
            ProviderOutcome::Failed(message) => {
                vec![format!("{}: error: {}", self.provider, message)]
            }
        }
    }
}

fn no_stats_line(provider: &str) -> String {
    format!("{provider}: no stats found for this period")
}

/// Fetch and summarize a single provider
pub async fn process_provider(
    fetcher: &dyn ReportFetcher,
    provider: &ProviderDescriptor,
    range: &DateRange,
) -> ProviderReport {
    let outcome = match fetcher.fetch(provider, range).await {
        Ok(payload) => outcome_for_payload(&provider.name, payload),
        Err(err) => {
            tracing::warn!(provider = %provider.name, "Report fetch failed: {}", err);
            ProviderOutcome::Failed(err.to_string())
        }
    };

    ProviderReport {
        provider: provider.name.clone(),
        category: provider.category,
        outcome,
        fetched_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn outcome_for_payload(provider: &str, payload: RawReportPayload) -> ProviderOutcome {
    for exception in report::report_exceptions(&payload) {
        tracing::info!(provider = %provider, "Provider reported {}", exception);
    }

    match report::summarize(&payload) {
        Ok(AggregateResult::Total(total)) => ProviderOutcome::Total(total),
        Ok(AggregateResult::NoData) => match payload {
            RawReportPayload::DecodeFailed { request_url, body } => {
                ProviderOutcome::DecodeFailed { request_url, body }
            }
            RawReportPayload::Decoded(_) => ProviderOutcome::NoData,
        },
        Err(violation) => {
            tracing::warn!(provider = %provider, "Report schema violation: {}", violation);
            ProviderOutcome::Failed(violation.to_string())
        }
    }
}

/// Run every provider of one category.
///
/// `on_report` sees each report in table order as soon as it is available.
pub async fn run_category<F>(
    fetcher: Arc<dyn ReportFetcher>,
    providers: Vec<ProviderDescriptor>,
    range: &DateRange,
    options: RunOptions,
    mut on_report: F,
) -> Result<Vec<ProviderReport>, RunError>
where
    F: FnMut(&ProviderReport),
{
    tracing::debug!(
        "Running {} provider(s) for {} to {}",
        providers.len(),
        range.begin_date,
        range.end_date
    );

    let mut delivered = Vec::with_capacity(providers.len());
    if options.parallel {
        for report in fetch_parallel(fetcher, providers, range).await? {
            deliver(report, options, &mut on_report, &mut delivered)?;
        }
    } else {
        for provider in &providers {
            let report = process_provider(fetcher.as_ref(), provider, range).await;
            deliver(report, options, &mut on_report, &mut delivered)?;
        }
    }
    Ok(delivered)
}

fn deliver<F>(
    report: ProviderReport,
    options: RunOptions,
    on_report: &mut F,
    delivered: &mut Vec<ProviderReport>,
) -> Result<(), RunError>
where
    F: FnMut(&ProviderReport),
{
    on_report(&report);
    let abort = match &report.outcome {
        ProviderOutcome::Failed(message) if options.fail_fast => Some(RunError::Aborted {
            provider: report.provider.clone(),
            message: message.clone(),
        }),
        _ => None,
    };
    delivered.push(report);
    match abort {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn fetch_parallel(
    fetcher: Arc<dyn ReportFetcher>,
    providers: Vec<ProviderDescriptor>,
    range: &DateRange,
) -> Result<Vec<ProviderReport>, RunError> {
    let mut handles = Vec::with_capacity(providers.len());
    for provider in providers {
        let fetcher = Arc::clone(&fetcher);
        let range = range.clone();
        let name = provider.name.clone();
        let handle = tokio::spawn(async move {
            process_provider(fetcher.as_ref(), &provider, &range).await
        });
        handles.push((name, handle));
    }

    // Awaiting in spawn order keeps table order
    let mut reports = Vec::with_capacity(handles.len());
    for (provider, handle) in handles {
        let report = handle.await.map_err(|err| RunError::Join {
            provider,
            message: err.to_string(),
        })?;
        reports.push(report);
    }
    Ok(reports)
}
