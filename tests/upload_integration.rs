//! Integration tests for multipart uploads.
//!
//! Manifests are written to temp directories and streamed to a mock server;
//! assertions inspect the multipart body the server received.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use socket_sdk::multipart::BOUNDARY;
use socket_sdk::types::FullScanParams;
use socket_sdk::{
    ClientOptions, ErrorKind, FileValidationDecision, FileValidationReport, FileValidator,
    RequestHooks, RequestInfo, SocketClient,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn client_for(server: &MockServer, options: ClientOptions) -> SocketClient {
    let options = options
        .base_url(format!("{}/v0", server.uri()))
        .retries(0)
        .retry_delay(Duration::from_millis(5));
    SocketClient::with_options("test-token", options).expect("client should build")
}

fn write_manifests(dir: &TempDir) -> (PathBuf, PathBuf) {
    let package = dir.path().join("package.json");
    std::fs::write(&package, r#"{"name":"web","version":"1.0.0"}"#).expect("write package.json");
    let nested = dir.path().join("packages").join("api");
    std::fs::create_dir_all(&nested).expect("create nested dir");
    let lockfile = nested.join("package-lock.json");
    std::fs::write(&lockfile, r#"{"lockfileVersion":3}"#).expect("write lockfile");
    (package, lockfile)
}

async fn single_body(server: &MockServer) -> String {
    let requests: Vec<Request> = server.received_requests().await.expect("recording is on");
    assert_eq!(requests.len(), 1);
    String::from_utf8(requests[0].body.clone()).expect("multipart body is utf-8 here")
}

#[tokio::test]
async fn test_full_scan_streams_every_file() {
    let server = MockServer::start().await;
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    Mock::given(method("POST"))
        .and(path("/v0/orgs/acme/full-scans"))
        .and(header("content-type", content_type.as_str()))
        .and(query_param("repo", "web"))
        .and(query_param("make_default_branch", "true"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "scan-1",
            "html_report_url": "https://socket.dev/scan/1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let (package, lockfile) = write_manifests(&dir);
    let client = client_for(&server, ClientOptions::default());
    let mut params = FullScanParams::new("web");
    params.make_default_branch = Some(true);

    let scan = client
        .create_org_full_scan("acme", &[package, lockfile], dir.path(), &params)
        .await;
    assert_eq!(scan.status(), Some(201));
    let scan = scan.into_result().expect("scan created");
    let scan = scan.known().expect("known scan shape");
    assert_eq!(scan.id, "scan-1");
    assert_eq!(scan.html_report_url.as_deref(), Some("https://socket.dev/scan/1"));

    let body = single_body(&server).await;
    assert!(body.contains(
        r#"Content-Disposition: form-data; name="package.json"; filename="package.json""#
    ));
    assert!(body.contains(
        r#"Content-Disposition: form-data; name="packages/api/package-lock.json"; filename="package-lock.json""#
    ));
    assert!(body.contains(r#"{"name":"web","version":"1.0.0"}"#));
    assert!(body.contains(r#"{"lockfileVersion":3}"#));
    assert!(body.ends_with(&format!("--{BOUNDARY}--\r\n")));
}

#[tokio::test]
async fn test_unreadable_files_are_skipped_without_validator() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/dependencies/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "snap" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let (package, _) = write_manifests(&dir);
    let missing = dir.path().join("yarn.lock");
    let client = client_for(&server, ClientOptions::default());

    let result = client
        .create_dependencies_snapshot(&[package, missing], dir.path(), Vec::new())
        .await;
    assert!(result.is_success());

    let body = single_body(&server).await;
    assert!(body.contains(r#"name="package.json""#));
    assert!(!body.contains("yarn.lock"));
}

struct AbortOnMissing;

#[async_trait]
impl FileValidator for AbortOnMissing {
    async fn validate(&self, report: &FileValidationReport) -> FileValidationDecision {
        FileValidationDecision::Abort {
            error: Some(format!(
                "{}: {} manifest(s) unreadable",
                report.operation,
                report.invalid.len()
            )),
            cause: None,
        }
    }
}

#[tokio::test]
async fn test_validator_abort_prevents_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let (package, _) = write_manifests(&dir);
    let client = client_for(
        &server,
        ClientOptions::default().file_validator(Arc::new(AbortOnMissing)),
    );

    let error = client
        .create_org_full_scan(
            "acme",
            &[package, dir.path().join("missing.json")],
            dir.path(),
            &FullScanParams::new("web"),
        )
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FileValidation);
    assert_eq!(error.message(), "createOrgFullScan: 1 manifest(s) unreadable");
    assert!(error.cause().unwrap_or_default().contains("missing.json"));
}

#[tokio::test]
async fn test_full_scan_from_json_uploads_buffer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/orgs/acme/full-scans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "scan-2" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, ClientOptions::default());
    let sbom = json!({ "bomFormat": "CycloneDX", "components": [] });
    let result = client
        .create_org_full_scan_from_json("acme", &sbom, Some("bom.cdx.json"), &FullScanParams::new("web"))
        .await;
    assert!(result.is_success());

    let body = single_body(&server).await;
    assert!(body.contains(
        r#"Content-Disposition: form-data; name="bom.cdx"; filename="bom.cdx.json""#
    ));
    assert!(body.contains("Content-Type: application/json"));
    assert!(body.contains(r#""bomFormat":"CycloneDX""#));
}

/// Removes a readable file once validation has run, then lets the upload go ahead.
struct RemoveThenProceed {
    victim: PathBuf,
}

#[async_trait]
impl FileValidator for RemoveThenProceed {
    async fn validate(&self, _report: &FileValidationReport) -> FileValidationDecision {
        std::fs::remove_file(&self.victim).expect("remove validated file");
        FileValidationDecision::Proceed
    }
}

#[derive(Default)]
struct AttemptCounter {
    attempts: AtomicU32,
}

impl RequestHooks for AttemptCounter {
    fn on_request(&self, _info: &RequestInfo) {
        self.attempts.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_file_removed_after_validation_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "scan-3" })))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("temp dir");
    let (package, lockfile) = write_manifests(&dir);
    let counter = Arc::new(AttemptCounter::default());
    let options = ClientOptions::default()
        .base_url(format!("{}/v0", server.uri()))
        .retries(3)
        .retry_delay(Duration::from_millis(5))
        .hooks(counter.clone())
        .file_validator(Arc::new(RemoveThenProceed {
            victim: lockfile.clone(),
        }));
    let client = SocketClient::with_options("test-token", options).expect("client should build");

    let error = client
        .create_org_full_scan(
            "acme",
            &[package, lockfile, dir.path().join("missing.json")],
            dir.path(),
            &FullScanParams::new("web"),
        )
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(counter.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(error.kind(), ErrorKind::FileValidation);
    assert_eq!(error.status(), None);
    assert!(error.message().contains("package-lock.json"), "{}", error.message());
    assert!(!error.report().contains("Could not reach"), "{}", error.report());
}
