//! Integration tests for the client request path.
//!
//! These tests drive `SocketClient` against a wiremock server and check
//! authentication, caching, hooks, response decoding and error shaping.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use socket_sdk::request::REDACTED;
use socket_sdk::{
    ApiResult, ApiValue, ClientOptions, ErrorKind, Payload, RequestDescriptor, RequestHooks,
    RequestInfo, ResponseInfo, SocketClient,
};
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

/// base64("test-token:")
const AUTH_HEADER: &str = "Basic dGVzdC10b2tlbjo=";

fn options_for(server: &MockServer) -> ClientOptions {
    ClientOptions::default()
        .base_url(format!("{}/v0", server.uri()))
        .retries(0)
        .retry_delay(Duration::from_millis(10))
}

fn client_for(server: &MockServer) -> SocketClient {
    SocketClient::with_options(TOKEN, options_for(server)).expect("client should build")
}

fn expect_error<T: std::fmt::Debug>(result: ApiResult<T>) -> socket_sdk::SocketError {
    match result {
        ApiResult::Error(error) => error,
        ApiResult::Success { status, data } => {
            panic!("expected an error, got {status}: {data:?}")
        }
    }
}

// ==================== Request Shape Tests ====================

#[tokio::test]
async fn test_quota_sends_basic_auth_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .and(header("authorization", AUTH_HEADER))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "quota": 950 })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.get_quota().await {
        ApiResult::Success { status, data } => {
            assert_eq!(status, 200);
            assert_eq!(data.quota, 950);
        }
        ApiResult::Error(error) => panic!("quota failed: {}", error.report()),
    }
}

#[tokio::test]
async fn test_scoped_package_path_is_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/npm/%40babel%2Fcore/7.24.0/score"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "supplyChainRisk": { "score": 0.9 },
            "quality": { "score": 0.8 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let score = client
        .get_score_by_npm_package("@babel/core", "7.24.0")
        .await
        .into_result()
        .expect("score should decode");
    let score = score.known().expect("score should match the known shape");
    assert!(score.categories.contains_key("supplyChainRisk"));
}

#[tokio::test]
async fn test_query_keys_are_renamed_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/report"))
        .and(query_param("default_branch", "true"))
        .and(query_param("pull_request", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = RequestDescriptor::get("report")
        .with_query([("defaultBranch", "true"), ("pullRequest", "42"), ("empty", "")]);
    let payload = client.send(request).await.into_result().expect("send should succeed");
    assert_eq!(payload, Payload::Json(json!({ "ok": true })));

    let received = server.received_requests().await.expect("recording is on");
    let query = received[0].url.query().unwrap_or_default().to_string();
    assert!(!query.contains("empty"), "empty values are dropped: {query}");
}

// ==================== Cache Tests ====================

#[tokio::test]
async fn test_cache_serves_repeated_get_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "quota": 10 })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        SocketClient::with_options(TOKEN, options_for(&server).cache(true)).expect("client");
    for _ in 0..3 {
        let quota = client.get_quota().await.into_result().expect("quota");
        assert_eq!(quota.quota, 10);
    }
}

#[tokio::test]
async fn test_cache_disabled_reaches_network_every_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "quota": 10 })))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.get_quota().await.into_result().expect("first");
    client.get_quota().await.into_result().expect("second");
}

#[tokio::test]
async fn test_cache_distinguishes_queries_with_embedded_separators() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/lookup"))
        .and(query_param("a", "1&b=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "which": "one-param" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v0/lookup"))
        .and(query_param("a", "1"))
        .and(query_param("b", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "which": "two-params" })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        SocketClient::with_options(TOKEN, options_for(&server).cache(true)).expect("client");
    let joined = client
        .send_json::<serde_json::Value>(
            RequestDescriptor::get("lookup").with_query([("a", "1&b=2")]),
        )
        .await
        .into_result()
        .expect("joined query");
    let split = client
        .send_json::<serde_json::Value>(
            RequestDescriptor::get("lookup").with_query([("a", "1"), ("b", "2")]),
        )
        .await
        .into_result()
        .expect("split query");

    assert_eq!(joined, json!({ "which": "one-param" }));
    assert_eq!(split, json!({ "which": "two-params" }));
}

#[tokio::test]
async fn test_failed_responses_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "quota": 3 })))
        .mount(&server)
        .await;

    let client =
        SocketClient::with_options(TOKEN, options_for(&server).cache(true)).expect("client");
    assert!(!client.get_quota().await.is_success());
    let quota = client.get_quota().await.into_result().expect("second call");
    assert_eq!(quota.quota, 3);
}

#[tokio::test]
async fn test_post_requests_bypass_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/purl"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(2)
        .mount(&server)
        .await;

    let client =
        SocketClient::with_options(TOKEN, options_for(&server).cache(true)).expect("client");
    let components = vec!["pkg:npm/lodash@4.17.21".to_string()];
    for _ in 0..2 {
        let result = client.batch_package_fetch(components.clone(), Vec::new()).await;
        assert!(result.is_success());
    }
}

// ==================== Error Shaping Tests ====================

#[tokio::test]
async fn test_unauthorized_reports_guidance_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = SocketClient::with_options(TOKEN, options_for(&server).retries(3))
        .expect("client");
    let error = expect_error(client.get_quota().await);

    assert_eq!(error.kind(), ErrorKind::HttpStatus);
    assert_eq!(error.status(), Some(401));
    assert_eq!(error.message(), "Socket API Request failed (401): Unauthorized");
    assert!(error.cause().unwrap_or_default().contains("Authentication failed"));
}

#[tokio::test]
async fn test_upstream_error_message_is_appended() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/purl"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Invalid purl 'pkg:npm/'" }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = expect_error(
        client
            .batch_package_fetch(vec!["pkg:npm/".to_string()], Vec::new())
            .await,
    );
    assert_eq!(
        error.message(),
        "Socket API Request failed (400): Bad Request: Invalid purl 'pkg:npm/'"
    );
    assert!(error.cause().unwrap_or_default().contains("Bad request"));
}

#[tokio::test]
async fn test_rate_limit_reports_retry_after_seconds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "60"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = expect_error(client.get_quota().await);
    assert_eq!(error.status(), Some(429));
    let cause = error.cause().unwrap_or_default();
    assert!(cause.contains("Rate limit exceeded"), "{cause}");
    assert!(cause.contains("Retry after 60 seconds"), "{cause}");
}

#[tokio::test]
async fn test_into_result_keeps_identical_wording() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let returned = expect_error(client.get_quota().await);
    let thrown = client.get_quota().await.into_result().unwrap_err();
    assert_eq!(returned, thrown);
    assert_eq!(thrown.to_string(), returned.message());
}

// ==================== Response Decoding Tests ====================

#[tokio::test]
async fn test_html_body_is_diagnosed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<!DOCTYPE html><html><body>Sign in</body></html>"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = expect_error(client.get_quota().await);
    assert_eq!(error.kind(), ErrorKind::Protocol);
    assert!(error.message().contains("invalid JSON"), "{}", error.message());
    assert!(error.message().contains("Unexpected Content-Type: text/html"));
    assert!(error.message().contains("HTML"));
    assert!(error.cause().unwrap_or_default().contains("Response preview"));
}

#[tokio::test]
async fn test_gateway_text_under_200_is_diagnosed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string("502 Bad Gateway"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = expect_error(client.get_quota().await);
    assert!(error.message().contains("gateway error"), "{}", error.message());
}

#[tokio::test]
async fn test_gateway_text_inside_json_under_200_is_diagnosed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "error": "upstream said 502 Bad Gateway" })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = expect_error(client.get_quota().await);
    assert_eq!(error.kind(), ErrorKind::Protocol);
    assert!(error.message().contains("gateway error"), "{}", error.message());
}

#[tokio::test]
async fn test_empty_body_decodes_as_empty_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/settings"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let payload = client
        .send(RequestDescriptor::get("settings"))
        .await
        .into_result()
        .expect("empty body is not an error");
    assert_eq!(payload, Payload::Json(json!({})));
}

#[tokio::test]
async fn test_oversized_response_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let client = SocketClient::with_options(TOKEN, options_for(&server).max_response_size(1024))
        .expect("client");
    let error = expect_error(client.get_quota().await);
    assert_eq!(error.kind(), ErrorKind::Protocol);
    assert!(error.message().contains("1024 bytes"), "{}", error.message());
}

#[tokio::test]
async fn test_batch_fetch_decodes_ndjson() {
    let server = MockServer::start().await;
    let body = concat!(
        r#"{"type":"npm","name":"lodash","version":"4.17.21","alerts":[]}"#,
        "\n",
        r#"{"unexpected":"shape"}"#,
        "\n\n"
    );
    Mock::given(method("POST"))
        .and(path("/v0/purl"))
        .and(query_param("alerts", "true"))
        .and(body_json(json!({
            "components": [{ "purl": "pkg:npm/lodash@4.17.21" }, { "purl": "pkg:npm/left-pad@1.3.0" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let artifacts = client
        .batch_package_fetch(
            vec![
                "pkg:npm/lodash@4.17.21".to_string(),
                "pkg:npm/left-pad@1.3.0".to_string(),
            ],
            vec![("alerts".to_string(), "true".to_string())],
        )
        .await
        .into_result()
        .expect("batch should decode");

    assert_eq!(artifacts.len(), 2);
    let lodash = artifacts[0].known().expect("first line is a known artifact");
    assert_eq!(lodash.name, "lodash");
    assert_eq!(lodash.ecosystem, "npm");
    assert!(matches!(artifacts[1], ApiValue::Opaque(_)));
}

// ==================== Hook Tests ====================

#[derive(Default)]
struct Recorder {
    requests: Mutex<Vec<RequestInfo>>,
    responses: Mutex<Vec<ResponseInfo>>,
}

impl RequestHooks for Recorder {
    fn on_request(&self, info: &RequestInfo) {
        self.requests.lock().unwrap().push(info.clone());
    }

    fn on_response(&self, info: &ResponseInfo) {
        self.responses.lock().unwrap().push(info.clone());
    }
}

#[tokio::test]
async fn test_hooks_fire_once_per_attempt_with_redacted_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v0/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "quota": 1 })))
        .mount(&server)
        .await;

    let recorder = Arc::new(Recorder::default());
    let options = options_for(&server).retries(2).hooks(recorder.clone());
    let client = SocketClient::with_options(TOKEN, options).expect("client");
    client.get_quota().await.into_result().expect("second attempt succeeds");

    let requests = recorder.requests.lock().unwrap();
    let responses = recorder.responses.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(responses.len(), 2);
    assert_eq!(requests[0].attempt, 0);
    assert_eq!(requests[1].attempt, 1);
    assert_eq!(
        requests[0].headers.get("authorization").map(String::as_str),
        Some(REDACTED)
    );
    assert_eq!(responses[0].status, Some(500));
    assert_eq!(responses[1].status, Some(200));
}
