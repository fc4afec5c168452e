//! Integration tests for audio manifest fulfillment.
//!
//! These tests run the download, parse and license-check pipeline against
//! mock servers.

use std::sync::Arc;

use borrow_core::events::ManifestSource;
use borrow_core::http::HttpClient;
use borrow_core::manifest::{
    AudioBookCredentials, EncryptionSchemeCheck, ManifestData, VendorClientCredentials,
    manifest_cache_path,
};
use borrow_core::mime;
use borrow_core::{
    BorrowConfig, ErrorCode, EventSender, ManifestFulfillment, ManifestRequest, MimeType,
    PipelineEvent, TaskResult,
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fulfillment(events: &EventSender) -> ManifestFulfillment {
    let http = HttpClient::new(&BorrowConfig::default()).expect("client should build");
    ManifestFulfillment::new(http, events.clone())
}

fn manifest_json(scheme: Option<&str>) -> serde_json::Value {
    let mut chapter = serde_json::json!({"href": "chapter1.mp3", "type": "audio/mpeg"});
    if let Some(scheme) = scheme {
        chapter["properties"] = serde_json::json!({"encrypted": {"scheme": scheme}});
    }
    serde_json::json!({
        "metadata": {"title": "Spoken Word", "identifier": "urn:isbn:9780000000001"},
        "readingOrder": [chapter]
    })
}

async fn serve_manifest(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                serde_json::to_vec(&body).expect("serializable manifest"),
                mime::AUDIOBOOK_MANIFEST,
            ),
        )
        .mount(server)
        .await;
}

fn request(server: &MockServer, content_type: &str) -> ManifestRequest {
    ManifestRequest::new(
        Url::parse(&format!("{}/manifest.json", server.uri())).expect("valid url"),
        MimeType::parse(content_type).expect("valid content type"),
        "borrow-tests",
    )
}

fn success(result: TaskResult<ManifestData>) -> ManifestData {
    match result {
        TaskResult::Success { value, .. } => value,
        TaskResult::Failure { steps } => panic!("fulfillment failed: {steps:?}"),
    }
}

#[tokio::test]
async fn test_basic_fetch_parses_and_caches() {
    let server = MockServer::start().await;
    serve_manifest(&server, manifest_json(None)).await;
    let cache = TempDir::new().expect("failed to create temp dir");
    let events = EventSender::new(32);
    let mut rx = events.subscribe();
    let request = request(&server, mime::AUDIOBOOK_MANIFEST)
        .with_cache_directory(Some(cache.path().join("manifests")));

    let data = success(fulfillment(&events).execute(&request).await);

    assert_eq!(data.manifest.title, "Spoken Word");
    assert_eq!(data.manifest.reading_order.len(), 1);
    let cached = std::fs::read(manifest_cache_path(
        &cache.path().join("manifests"),
        &request.target,
    ))
    .expect("manifest should be cached");
    assert_eq!(cached, data.fulfilled.data);

    let mut fetched = None;
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::ManifestFetched { source, .. } = event {
            fetched = Some(source);
        }
    }
    assert_eq!(fetched, Some(ManifestSource::Network));
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let server = MockServer::start().await;
    serve_manifest(&server, manifest_json(None)).await;
    let events = EventSender::new(32);
    let pipeline = fulfillment(&events);
    let request = request(&server, mime::AUDIOBOOK_MANIFEST);

    let first = success(pipeline.execute(&request).await);
    let second = success(pipeline.execute(&request).await);

    assert_eq!(first.fulfilled.data, second.fulfilled.data);
    assert_eq!(first.manifest.title, second.manifest.title);
    assert_eq!(
        first.manifest.reading_order.len(),
        second.manifest.reading_order.len()
    );
}

#[tokio::test]
async fn test_cached_manifest_serves_offline_run() {
    let server = MockServer::start().await;
    serve_manifest(&server, manifest_json(None)).await;
    let cache = TempDir::new().expect("failed to create temp dir");
    let events = EventSender::new(32);
    let pipeline = fulfillment(&events);
    let online = request(&server, mime::AUDIOBOOK_MANIFEST)
        .with_cache_directory(Some(cache.path().to_path_buf()));
    let fetched = success(pipeline.execute(&online).await);

    let cached = std::fs::read(manifest_cache_path(cache.path(), &online.target))
        .expect("manifest should be cached");
    let content_type = online.content_type.clone();
    let offline = request(&server, mime::AUDIOBOOK_MANIFEST)
        .with_network_probe(Arc::new(|| false))
        .with_fallback(Some(Arc::new(move || {
            Some(borrow_core::manifest::ManifestFulfilled {
                content_type: content_type.clone(),
                data: cached.clone(),
            })
        })));
    let replayed = success(pipeline.execute(&offline).await);

    assert_eq!(replayed.fulfilled.data, fetched.fulfilled.data);
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn test_offline_without_fallback_reports_missing_data() {
    let server = MockServer::start().await;
    let events = EventSender::new(8);
    let request = request(&server, mime::AUDIOBOOK_MANIFEST).with_network_probe(Arc::new(|| false));

    let result = fulfillment(&events).execute(&request).await;

    assert!(!result.is_success());
    assert_eq!(result.steps().len(), 1);
    let step = result.last_failed_step().expect("failed step");
    assert_eq!(step.error_code(), Some(ErrorCode::ManifestNoFallback));
    assert!(step.message().contains("no fallback data"), "{}", step.message());
}

#[tokio::test]
async fn test_vendor_type_without_client_never_downloads() {
    let server = MockServer::start().await;
    serve_manifest(&server, manifest_json(None)).await;
    let events = EventSender::new(8);
    let vendor_type = format!("{};profile=audiobook", mime::OVERDRIVE_AUDIOBOOK);
    let request = request(&server, &vendor_type).with_credentials(Some(
        AudioBookCredentials::UsernamePassword {
            username: "patron".to_string(),
            password: "1234".to_string(),
        },
    ));

    let result = fulfillment(&events).execute(&request).await;

    assert_eq!(result.steps().len(), 1);
    assert_eq!(result.error_code(), Some(ErrorCode::ManifestConfiguration));
    assert!(
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .is_empty()
    );
}

#[tokio::test]
async fn test_vendor_strategy_exchanges_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=patron"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"access_token": "vendor"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .and(header("authorization", "Bearer vendor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest_json(None)))
        .expect(1)
        .mount(&server)
        .await;
    let events = EventSender::new(32);
    let pipeline = fulfillment(&events).with_vendor_client(Some(VendorClientCredentials {
        client_key: "key".to_string(),
        client_secret: "secret".to_string(),
        token_endpoint: Url::parse(&format!("{}/oauth/token", server.uri())).expect("valid url"),
    }));
    let vendor_type = format!("{};profile=audiobook", mime::OVERDRIVE_AUDIOBOOK);
    let request = request(&server, &vendor_type).with_credentials(Some(
        AudioBookCredentials::UsernameOnly {
            username: "patron".to_string(),
        },
    ));

    let data = success(pipeline.execute(&request).await);

    assert_eq!(data.manifest.title, "Spoken Word");
}

#[tokio::test]
async fn test_missing_manifest_is_download_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let events = EventSender::new(8);

    let result = fulfillment(&events)
        .execute(&request(&server, mime::AUDIOBOOK_MANIFEST))
        .await;

    assert_eq!(result.error_code(), Some(ErrorCode::ManifestDownloadFailed));
    assert_eq!(result.steps().len(), 1);
}

#[tokio::test]
async fn test_unsupported_encryption_fails_license_check() {
    let server = MockServer::start().await;
    serve_manifest(&server, manifest_json(Some("http://vendor.example/drm"))).await;
    let events = EventSender::new(32);
    let pipeline = fulfillment(&events)
        .with_license_check(Arc::new(EncryptionSchemeCheck::new(Vec::<String>::new())));

    let result = pipeline
        .execute(&request(&server, mime::AUDIOBOOK_MANIFEST))
        .await;

    assert_eq!(result.error_code(), Some(ErrorCode::LicenseCheckFailed));
    assert_eq!(result.steps().len(), 3);
    let step = result.last_failed_step().expect("failed step");
    assert!(step.message().contains("vendor.example/drm"), "{}", step.message());
}
