//! Provider system for fetching SUSHI usage reports

pub mod catalog;
mod sushi;
mod traits;

pub use catalog::{ProviderCatalog, ProviderSpec, QueryParam};
pub use sushi::{build_request_url, decode_payload, SushiClient};
pub use traits::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Query parameters whose values are credentials
const SENSITIVE_PARAMS: &[&str] = &["requestor_id", "customer_id", "api_key"];

/// Report category, one provider table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Books,
    Journals,
    Multimedia,
}

impl Category {
    pub fn all() -> Vec<Category> {
        vec![Category::Books, Category::Journals, Category::Multimedia]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Books => "books",
            Category::Journals => "journals",
            Category::Multimedia => "multimedia",
        }
    }

    /// COUNTER 5 report requested for this category
    pub fn report_code(&self) -> &'static str {
        match self {
            Category::Books => "tr_b1",
            Category::Journals => "tr_j1",
            Category::Multimedia => "ir_m1",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "books" | "book" => Ok(Category::Books),
            "journals" | "journal" => Ok(Category::Journals),
            "multimedia" => Ok(Category::Multimedia),
            other => Err(format!("Unknown category: {other}")),
        }
    }
}

/// A provider endpoint with credentials already interpolated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub name: String,
    pub category: Category,
    pub base_url: String,
}

impl ProviderDescriptor {
    pub fn new(name: impl Into<String>, category: Category, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            base_url: base_url.into(),
        }
    }

    /// Base URL with credential values masked, for logs and listings
    pub fn redacted_url(&self) -> String {
        redact_url(&self.base_url)
    }
}

/// Requested reporting period. Both ends are opaque and never validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub begin_date: String,
    pub end_date: String,
}

impl DateRange {
    pub fn new(begin_date: impl Into<String>, end_date: impl Into<String>) -> Self {
        Self {
            begin_date: begin_date.into(),
            end_date: end_date.into(),
        }
    }
}

/// Mask credential query values in `raw`; unparseable input is returned as is
pub fn redact_url(raw: &str) -> String {
    let Ok(mut url) = url::Url::parse(raw) else {
        return raw.to_string();
    };
    if url.query().is_none() {
        return raw.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| {
            let value = if SENSITIVE_PARAMS.contains(&key.as_ref()) && !value.is_empty() {
                "***".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect();
    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}
