//! SUSHI report payloads and their reduction to a single usage count
//!
//! Only the first `Instance` of every `Performance` record is inspected: the
//! item-level reports this tool requests carry one instance per performance
//! block. A record without any instance is a schema violation.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Metric type that is summed; every other metric type is ignored
pub const TOTAL_ITEM_REQUESTS: &str = "Total_Item_Requests";

/// Body of a single report request, decoded or not
#[derive(Debug, Clone, PartialEq)]
pub enum RawReportPayload {
    Decoded(Value),
    /// The body was not valid JSON; kept verbatim for diagnostics
    DecodeFailed { request_url: String, body: String },
}

/// Final count for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateResult {
    Total(u64),
    NoData,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("report item {item}, performance record {record} has no Instance entries")]
    EmptyInstances { item: usize, record: usize },
    #[error("Report_Items does not match the report schema: {0}")]
    Malformed(String),
    #[error("report item {item}, performance record {record} has a Total_Item_Requests Count that is not a non-negative integer")]
    InvalidCount { item: usize, record: usize },
    #[error("Total_Item_Requests total overflows at report item {item}, performance record {record}")]
    Overflow { item: usize, record: usize },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportItem {
    #[serde(rename = "Performance", default)]
    pub performance: Vec<PerformanceRecord>,
}

/// Instances stay undecoded; only the first one of a record is ever read
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceRecord {
    #[serde(rename = "Instance", default)]
    pub instances: Vec<Value>,
}

impl PerformanceRecord {
    /// `Count` of the first instance when it is a `Total_Item_Requests`
    /// metric, `Ok(None)` for any other metric type.
    fn total_item_requests(
        &self,
        item: usize,
        record: usize,
    ) -> Result<Option<u64>, SchemaViolation> {
        let first = self
            .instances
            .first()
            .ok_or(SchemaViolation::EmptyInstances { item, record })?;
        if first.get("Metric_Type").and_then(Value::as_str) != Some(TOTAL_ITEM_REQUESTS) {
            return Ok(None);
        }
        first
            .get("Count")
            .and_then(Value::as_u64)
            .map(Some)
            .ok_or(SchemaViolation::InvalidCount { item, record })
    }
}

/// Reduce a payload to its `Total_Item_Requests` count.
///
/// A payload without a `Report_Items` collection (or one that failed to
/// decode) has no data for the period. A present but empty collection is a
/// total of zero.
pub fn summarize(payload: &RawReportPayload) -> Result<AggregateResult, SchemaViolation> {
    let RawReportPayload::Decoded(value) = payload else {
        return Ok(AggregateResult::NoData);
    };

    let Some(raw_items) = value.get("Report_Items").filter(|items| !items.is_null()) else {
        return Ok(AggregateResult::NoData);
    };

    let items = Vec::<ReportItem>::deserialize(raw_items)
        .map_err(|err| SchemaViolation::Malformed(err.to_string()))?;

    sum_total_item_requests(&items).map(AggregateResult::Total)
}

/// Sum the first-instance counts of every record whose first instance is a
/// `Total_Item_Requests` metric.
pub fn sum_total_item_requests(items: &[ReportItem]) -> Result<u64, SchemaViolation> {
    let mut total: u64 = 0;
    for (item_index, item) in items.iter().enumerate() {
        for (record_index, record) in item.performance.iter().enumerate() {
            if let Some(count) = record.total_item_requests(item_index, record_index)? {
                total = total.checked_add(count).ok_or(SchemaViolation::Overflow {
                    item: item_index,
                    record: record_index,
                })?;
            }
        }
    }
    Ok(total)
}

/// Condition reported by the provider alongside (or instead of) report data
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportException {
    #[serde(rename = "Code")]
    pub code: Option<i64>,
    #[serde(rename = "Severity")]
    pub severity: Option<String>,
    #[serde(rename = "Message")]
    pub message: Option<String>,
    #[serde(rename = "Data")]
    pub data: Option<String>,
}

impl fmt::Display for ReportException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exception {code}")?,
            None => write!(f, "exception")?,
        }
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            write!(f, ": {message}")?;
        }
        if let Some(data) = self.data.as_deref().filter(|d| !d.is_empty()) {
            write!(f, " ({data})")?;
        }
        Ok(())
    }
}

/// Collect provider-declared exceptions from a decoded payload.
///
/// Looks in `Report_Header.Exceptions`, a top-level `Exceptions` array, a
/// top-level `Exception` object and a bare top-level array of exceptions.
/// Entries that do not look like exceptions are skipped.
pub fn report_exceptions(payload: &RawReportPayload) -> Vec<ReportException> {
    let RawReportPayload::Decoded(value) = payload else {
        return Vec::new();
    };

    let mut candidates: Vec<&Value> = Vec::new();
    if let Some(Value::Array(entries)) = value.pointer("/Report_Header/Exceptions") {
        candidates.extend(entries);
    }
    if let Some(Value::Array(entries)) = value.get("Exceptions") {
        candidates.extend(entries);
    }
    if let Some(entry @ Value::Object(_)) = value.get("Exception") {
        candidates.push(entry);
    }
    if let Value::Array(entries) = value {
        candidates.extend(entries);
    }

    candidates
        .into_iter()
        .filter(|entry| entry.get("Code").is_some() || entry.get("Message").is_some())
        .filter_map(|entry| ReportException::deserialize(entry).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decoded(value: Value) -> RawReportPayload {
        RawReportPayload::Decoded(value)
    }

    fn record(metric: &str, count: u64) -> Value {
        json!({ "Instance": [{ "Metric_Type": metric, "Count": count }] })
    }

    #[test]
    fn single_matching_record_is_its_count() {
        let payload = decoded(json!({
            "Report_Items": [{
                "Performance": [{
                    "Instance": [{ "Metric_Type": "Total_Item_Requests", "Count": 5 }]
                }]
            }]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(5)));
    }

    #[test]
    fn empty_report_items_is_zero_not_no_data() {
        let payload = decoded(json!({ "Report_Items": [] }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(0)));
    }

    #[test]
    fn missing_report_items_is_no_data() {
        assert_eq!(summarize(&decoded(json!({}))), Ok(AggregateResult::NoData));
        assert_eq!(
            summarize(&decoded(json!({ "Report_Items": null }))),
            Ok(AggregateResult::NoData)
        );
    }

    #[test]
    fn non_object_payload_is_no_data() {
        assert_eq!(summarize(&decoded(json!([1, 2]))), Ok(AggregateResult::NoData));
        assert_eq!(summarize(&decoded(json!("text"))), Ok(AggregateResult::NoData));
    }

    #[test]
    fn decode_failure_is_no_data() {
        let payload = RawReportPayload::DecodeFailed {
            request_url: "https://example.org/reports/tr_b1?x=1".to_string(),
            body: "<html>error</html>".to_string(),
        };
        assert_eq!(summarize(&payload), Ok(AggregateResult::NoData));
    }

    #[test]
    fn non_matching_metric_types_are_excluded() {
        let payload = decoded(json!({
            "Report_Items": [
                { "Performance": [record("Total_Item_Requests", 3)] },
                { "Performance": [record("Other", 99)] }
            ]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(3)));
    }

    #[test]
    fn sums_across_items_and_records() {
        let payload = decoded(json!({
            "Report_Items": [
                { "Performance": [
                    record("Total_Item_Requests", 10),
                    record("Unique_Item_Requests", 7),
                    record("Total_Item_Requests", 2)
                ] },
                { "Performance": [record("Total_Item_Requests", 30)] },
                { "Performance": [] }
            ]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(42)));
    }

    #[test]
    fn no_matching_records_is_zero() {
        let payload = decoded(json!({
            "Report_Items": [
                { "Performance": [record("Unique_Title_Requests", 4)] },
                { "Performance": [record("Limit_Exceeded", 1)] }
            ]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(0)));
    }

    #[test]
    fn only_first_instance_is_inspected() {
        let payload = decoded(json!({
            "Report_Items": [{
                "Performance": [
                    { "Instance": [
                        { "Metric_Type": "Unique_Item_Requests", "Count": 1 },
                        { "Metric_Type": "Total_Item_Requests", "Count": 100 }
                    ] },
                    { "Instance": [
                        { "Metric_Type": "Total_Item_Requests", "Count": 6 },
                        { "Metric_Type": "Total_Item_Requests", "Count": 100 }
                    ] }
                ]
            }]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(6)));
    }

    #[test]
    fn item_without_performance_contributes_zero() {
        let payload = decoded(json!({
            "Report_Items": [
                { "Title": "Orphan" },
                { "Performance": [record("Total_Item_Requests", 8)] }
            ]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(8)));
    }

    #[test]
    fn empty_instance_list_is_a_schema_violation() {
        let payload = decoded(json!({
            "Report_Items": [
                { "Performance": [record("Total_Item_Requests", 1)] },
                { "Performance": [record("Total_Item_Requests", 1), { "Instance": [] }] }
            ]
        }));
        assert_eq!(
            summarize(&payload),
            Err(SchemaViolation::EmptyInstances { item: 1, record: 1 })
        );
    }

    #[test]
    fn malformed_items_are_a_schema_violation() {
        let payload = decoded(json!({ "Report_Items": { "not": "a list" } }));
        assert!(matches!(summarize(&payload), Err(SchemaViolation::Malformed(_))));

        let payload = decoded(json!({
            "Report_Items": [{ "Performance": [record("Total_Item_Requests", 1)] }, {
                "Performance": [{ "Instance": [{ "Metric_Type": "Total_Item_Requests", "Count": -4 }] }]
            }]
        }));
        assert_eq!(
            summarize(&payload),
            Err(SchemaViolation::InvalidCount { item: 1, record: 0 })
        );

        let payload = decoded(json!({
            "Report_Items": [{ "Performance": [{ "Instance": [{ "Metric_Type": "Total_Item_Requests" }] }] }]
        }));
        assert_eq!(
            summarize(&payload),
            Err(SchemaViolation::InvalidCount { item: 0, record: 0 })
        );
    }

    #[test]
    fn later_instances_are_not_validated() {
        let payload = decoded(json!({
            "Report_Items": [{
                "Performance": [{ "Instance": [
                    { "Metric_Type": "Total_Item_Requests", "Count": 4 },
                    { "Metric_Type": "Unique_Item_Requests" }
                ] }]
            }]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(4)));
    }

    #[test]
    fn non_matching_counts_are_not_validated() {
        let payload = decoded(json!({
            "Report_Items": [{
                "Performance": [
                    record("Total_Item_Requests", 4),
                    { "Instance": [{ "Metric_Type": "Other", "Count": 1.5 }] },
                    { "Instance": [{ "Metric_Type": "Searches_Platform" }] }
                ]
            }]
        }));
        assert_eq!(summarize(&payload), Ok(AggregateResult::Total(4)));
    }

    #[test]
    fn overflowing_total_is_a_schema_violation() {
        let payload = decoded(json!({
            "Report_Items": [
                { "Performance": [record("Total_Item_Requests", u64::MAX)] },
                { "Performance": [record("Total_Item_Requests", 1)] }
            ]
        }));
        assert_eq!(
            summarize(&payload),
            Err(SchemaViolation::Overflow { item: 1, record: 0 })
        );
    }

    #[test]
    fn collects_header_exceptions() {
        let payload = decoded(json!({
            "Report_Header": {
                "Report_ID": "TR_B1",
                "Exceptions": [{
                    "Code": 3030,
                    "Severity": "Error",
                    "Message": "No Usage Available for Requested Dates",
                    "Data": "2024-01 to 2024-02"
                }]
            },
            "Report_Items": []
        }));
        let exceptions = report_exceptions(&payload);
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].code, Some(3030));
        assert_eq!(
            exceptions[0].to_string(),
            "exception 3030: No Usage Available for Requested Dates (2024-01 to 2024-02)"
        );
    }

    #[test]
    fn collects_top_level_exception_shapes() {
        let array = decoded(json!([{ "Code": 2010, "Message": "Requestor Not Authorized" }]));
        assert_eq!(report_exceptions(&array)[0].code, Some(2010));

        let object = decoded(json!({ "Exception": { "Code": 1000, "Message": "Service Not Available" } }));
        assert_eq!(report_exceptions(&object)[0].message.as_deref(), Some("Service Not Available"));

        let listed = decoded(json!({ "Exceptions": [{ "Code": 1020 }, { "unrelated": true }] }));
        assert_eq!(report_exceptions(&listed).len(), 1);

        assert!(report_exceptions(&decoded(json!({ "Report_Items": [] }))).is_empty());
    }
}
