//! sushi-stats - usage totals from SUSHI report endpoints
//!
//! Fetches COUNTER 5 reports from each configured content provider for a
//! date range and reduces every report to one `Total_Item_Requests` count.

pub mod commands;
pub mod config;
pub mod logging;
pub mod providers;
pub mod report;
pub mod storage;

pub use commands::{run_category, ProviderOutcome, ProviderReport, RunOptions};
pub use providers::{Category, DateRange, ProviderDescriptor, ReportFetcher, SushiClient};
pub use report::{summarize, AggregateResult, RawReportPayload};
