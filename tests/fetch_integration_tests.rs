//! HTTP-level tests for the SUSHI fetcher using wiremock.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use sushi_stats_lib::commands::{process_provider, run_category, ProviderOutcome, RunOptions};
use sushi_stats_lib::providers::{
    Category, DateRange, FetchError, ProviderDescriptor, ProviderSpec, ReportFetcher, SushiClient,
};
use sushi_stats_lib::report::RawReportPayload;
use sushi_stats_lib::storage::CredentialResolver;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn range() -> DateRange {
    DateRange::new("2024-01", "2024-06")
}

fn descriptor(server: &MockServer, name: &str, report: &str) -> ProviderDescriptor {
    ProviderDescriptor::new(
        name,
        Category::Books,
        format!("{}/reports/{report}?requestor_id=req-1&customer_id=cust-1", server.uri()),
    )
}

fn single_item_report(count: u64) -> serde_json::Value {
    json!({
        "Report_Header": { "Report_ID": "TR_B1", "Exceptions": [] },
        "Report_Items": [{
            "Title": "A Book",
            "Performance": [{
                "Period": { "Begin_Date": "2024-01-01", "End_Date": "2024-01-31" },
                "Instance": [{ "Metric_Type": "Total_Item_Requests", "Count": count }]
            }]
        }]
    })
}

#[tokio::test]
async fn fetch_appends_date_range_and_decodes_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/tr_b1"))
        .and(query_param("requestor_id", "req-1"))
        .and(query_param("customer_id", "cust-1"))
        .and(query_param("begin_date", "2024-01"))
        .and(query_param("end_date", "2024-06"))
        .respond_with(ResponseTemplate::new(200).set_body_json(single_item_report(5)))
        .expect(1)
        .mount(&server)
        .await;

    let client = SushiClient::new();
    let payload = client
        .fetch(&descriptor(&server, "cambridge", "tr_b1"), &range())
        .await
        .expect("fetch");

    assert_eq!(payload, RawReportPayload::Decoded(single_item_report(5)));
}

#[tokio::test]
async fn html_body_becomes_decode_failure_with_request_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/tr_j1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>error</html>"))
        .mount(&server)
        .await;

    let provider = descriptor(&server, "gale", "tr_j1");
    let report = process_provider(&SushiClient::new(), &provider, &range()).await;

    let expected_url = format!("{}&begin_date=2024-01&end_date=2024-06", provider.base_url);
    assert_eq!(
        report.outcome,
        ProviderOutcome::DecodeFailed {
            request_url: expected_url.clone(),
            body: "<html>error</html>".to_string(),
        }
    );
    assert_eq!(
        report.text_lines(),
        vec![
            expected_url,
            "<html>error</html>".to_string(),
            "gale: no stats found for this period".to_string(),
        ]
    );
}

#[tokio::test]
async fn error_status_is_a_transport_fault_with_redacted_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/tr_b1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let result = SushiClient::new()
        .fetch(&descriptor(&server, "ebsco", "tr_b1"), &range())
        .await;

    match result {
        Err(FetchError::Status { status, url, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
            assert!(url.contains("requestor_id=***"), "{url}");
            assert!(!url.contains("cust-1"), "{url}");
            assert!(url.contains("begin_date=2024-01"), "{url}");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_a_transport_fault() {
    let server = MockServer::start().await;
    let provider = descriptor(&server, "jstor", "tr_j1");
    drop(server);

    let result = SushiClient::new().fetch(&provider, &range()).await;
    assert!(matches!(result, Err(FetchError::Transport { .. })), "{result:?}");
}

#[tokio::test]
async fn category_run_against_mock_providers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/alpha/reports/ir_m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Report_Items": [
                { "Performance": [{ "Instance": [{ "Metric_Type": "Total_Item_Requests", "Count": 3 }] }] },
                { "Performance": [{ "Instance": [{ "Metric_Type": "Other", "Count": 99 }] }] }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta/reports/ir_m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gamma/reports/ir_m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Report_Items": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/delta/reports/ir_m1"))
        .and(query_param("api_key", "secret"))
        .and(query_param("platform", "bloomsbury_collections"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let credentials = CredentialResolver::fixed(HashMap::from([
        ("MOCK_REQUESTOR_ID".to_string(), "req".to_string()),
        ("MOCK_CUSTOMER_ID".to_string(), "cust".to_string()),
        ("MOCK_API_KEY".to_string(), "secret".to_string()),
    ]));
    let descriptors: Vec<_> = ["alpha", "beta", "gamma", "delta"]
        .iter()
        .map(|name| {
            let mut spec = ProviderSpec::new(
                *name,
                Category::Multimedia,
                format!("{}/{name}/reports/ir_m1", server.uri()),
            )
            .standard_credentials("MOCK");
            if *name == "delta" {
                spec = spec
                    .credential("api_key", "MOCK_API_KEY")
                    .literal("platform", "bloomsbury_collections");
            }
            spec.resolve(&credentials)
        })
        .collect();

    let fetcher: Arc<dyn ReportFetcher> = Arc::new(SushiClient::new());
    for parallel in [false, true] {
        let mut lines = Vec::new();
        let reports = run_category(
            Arc::clone(&fetcher),
            descriptors.clone(),
            &range(),
            RunOptions {
                parallel,
                fail_fast: false,
            },
            |report| lines.extend(report.text_lines()),
        )
        .await
        .expect("run");

        let statuses: Vec<_> = reports.iter().map(|r| r.outcome.status()).collect();
        assert_eq!(statuses, vec!["total", "no_data", "total", "error"]);
        assert_eq!(lines[0], "alpha: 3");
        assert_eq!(lines[1], "beta: no stats found for this period");
        assert_eq!(lines[2], "gamma: 0");
        assert!(lines[3].starts_with("delta: error: "), "{}", lines[3]);
    }
}
