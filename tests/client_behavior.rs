//! Behavior-driven tests for the SDMX client
//!
//! These tests verify HOW the client talks to the API: which endpoints and
//! headers it uses, how failures surface, and how request pacing behaves.

mod support;

use std::sync::Arc;
use std::time::Duration;

use ilostat_core::{ClientConfig, DataRequest, FetchError, HttpError, IloClient};
use support::{ScriptedHttpClient, CATALOGUE_JSON, DF_A_CSV};

fn test_config() -> ClientConfig {
    ClientConfig {
        base_url: String::from("https://sdmx.test/rest"),
        ..ClientConfig::default()
    }
}

// =============================================================================
// Client: Endpoints and negotiation
// =============================================================================

#[tokio::test]
async fn when_catalogue_is_requested_client_asks_for_structure_json() {
    // Given: An API that serves the dataflow listing
    let http = Arc::new(ScriptedHttpClient::new().route("/dataflow/ILO", 200, CATALOGUE_JSON));
    let client = IloClient::with_http_client(test_config(), http.clone());

    // When: The catalogue is fetched
    let message = client.fetch_catalogue().await.expect("catalogue");

    // Then: The JSON body is decoded and the request used structure negotiation
    assert_eq!(message["data"]["dataflows"][0]["id"], "DF_A");
    let requests = http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "https://sdmx.test/rest/dataflow/ILO");
    assert_eq!(
        requests[0].headers.get("accept").map(String::as_str),
        Some("application/vnd.sdmx.structure+json;version=1.0")
    );
    assert_eq!(requests[0].timeout_ms, 120_000);
}

#[tokio::test]
async fn when_data_is_requested_client_builds_sdmx_data_path() {
    // Given: An API that serves CSV data
    let http = Arc::new(ScriptedHttpClient::new().route("/data/ILO,DF_A,1.0/ALL", 200, DF_A_CSV));
    let client = IloClient::with_http_client(test_config(), http.clone());

    // When: Data is fetched with default key and version
    let body = client
        .fetch_data(&DataRequest::new("DF_A"))
        .await
        .expect("data");

    // Then: The CSV text is returned verbatim
    assert_eq!(body, DF_A_CSV);
    let request = &http.requests()[0];
    assert_eq!(request.url, "https://sdmx.test/rest/data/ILO,DF_A,1.0/ALL");
    assert_eq!(request.headers.get("accept").map(String::as_str), Some("text/csv"));
    assert!(request.query.is_empty());
}

#[tokio::test]
async fn when_periods_are_given_they_become_query_filters() {
    // Given: A data request narrowed to a period range and key
    let http = Arc::new(ScriptedHttpClient::new().route("/data/ILO,DF_A,1.1/FRA", 200, DF_A_CSV));
    let client = IloClient::with_http_client(test_config(), http.clone());
    let request = DataRequest::new("DF_A")
        .with_key("FRA")
        .with_version("1.1")
        .with_period(Some(String::from("2020")), Some(String::from("2024")));

    // When: The data is fetched
    client.fetch_data(&request).await.expect("data");

    // Then: startPeriod and endPeriod are passed as query parameters
    let sent = &http.requests()[0];
    assert_eq!(
        sent.query,
        vec![
            (String::from("startPeriod"), String::from("2020")),
            (String::from("endPeriod"), String::from("2024")),
        ]
    );
    assert_eq!(
        sent.full_url(),
        "https://sdmx.test/rest/data/ILO,DF_A,1.1/FRA?startPeriod=2020&endPeriod=2024"
    );
}

#[tokio::test]
async fn when_structure_is_requested_client_uses_datastructure_path() {
    // Given: An API that serves a data structure definition
    let http = Arc::new(ScriptedHttpClient::new().route(
        "/datastructure/ILO/DF_A",
        200,
        r#"{"data": {"dataStructures": [{"id": "DSD_A"}]}}"#,
    ));
    let client = IloClient::with_http_client(test_config(), http.clone());

    // When: The structure is fetched
    let message = client.fetch_structure("DF_A").await.expect("structure");

    // Then: The structure JSON is returned
    assert_eq!(message["data"]["dataStructures"][0]["id"], "DSD_A");
}

// =============================================================================
// Client: Failures
// =============================================================================

#[tokio::test]
async fn when_api_returns_non_success_status_error_carries_status_and_body() {
    // Given: An API that reports a missing dataflow
    let http = Arc::new(ScriptedHttpClient::new().route("/data/", 404, "NoResultsFound"));
    let client = IloClient::with_http_client(test_config(), http.clone());

    // When: Data is fetched
    let error = client
        .fetch_data(&DataRequest::new("DF_MISSING"))
        .await
        .expect_err("should fail");

    // Then: The status and body are preserved and no retry is attempted
    assert!(matches!(
        &error,
        FetchError::Status { status: 404, body } if body == "NoResultsFound"
    ));
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn when_transport_fails_error_is_not_retried() {
    // Given: A transport that times out
    let http = Arc::new(
        ScriptedHttpClient::new().route_error("/data/", HttpError::timeout("request timeout")),
    );
    let client = IloClient::with_http_client(test_config(), http.clone());

    // When: Data is fetched
    let error = client
        .fetch_data(&DataRequest::new("DF_A"))
        .await
        .expect_err("should fail");

    // Then: The transport error surfaces once
    assert!(matches!(&error, FetchError::Transport(inner) if inner.timed_out()));
    assert_eq!(http.requests().len(), 1);
}

#[tokio::test]
async fn when_catalogue_body_is_not_json_decode_error_is_returned() {
    // Given: An API that answers with HTML
    let http =
        Arc::new(ScriptedHttpClient::new().route("/dataflow/", 200, "<html>maintenance</html>"));
    let client = IloClient::with_http_client(test_config(), http);

    // When: The catalogue is fetched
    let error = client.fetch_catalogue().await.expect_err("should fail");

    // Then: A decode error is reported
    assert!(matches!(error, FetchError::Decode(_)));
}

// =============================================================================
// Client: Request pacing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn when_eleven_calls_are_made_back_to_back_the_eleventh_waits_for_the_window() {
    // Given: The default ceiling of 10 requests per second
    let http = Arc::new(ScriptedHttpClient::new().route("/data/", 200, DF_A_CSV));
    let client = IloClient::with_http_client(test_config(), http.clone());
    let started = tokio::time::Instant::now();

    // When: Ten calls are issued back to back
    for _ in 0..10 {
        client.fetch_data(&DataRequest::new("DF_A")).await.expect("data");
    }

    // Then: They all go out immediately
    assert_eq!(started.elapsed(), Duration::ZERO);

    // When: An eleventh call is issued
    let result = client.fetch_data(&DataRequest::new("DF_A")).await;

    // Then: It succeeds, but only after the window rolled over
    assert!(result.is_ok(), "throttled call must not be rejected");
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(http.requests().len(), 11);
}

#[tokio::test(start_paused = true)]
async fn when_calls_mix_endpoints_they_share_one_ceiling() {
    // Given: A tight ceiling of 2 requests per second
    let http = Arc::new(
        ScriptedHttpClient::new()
            .route("/dataflow/", 200, CATALOGUE_JSON)
            .route("/datastructure/", 200, "{}")
            .route("/data/", 200, DF_A_CSV),
    );
    let config = ClientConfig {
        rate_limit: 2,
        ..test_config()
    };
    let client = IloClient::with_http_client(config, http);
    let started = tokio::time::Instant::now();

    // When: Three different endpoints are called
    client.fetch_catalogue().await.expect("catalogue");
    client.fetch_structure("DF_A").await.expect("structure");
    client.fetch_data(&DataRequest::new("DF_A")).await.expect("data");

    // Then: The third call waited for capacity
    assert!(started.elapsed() >= Duration::from_secs(1));
}
