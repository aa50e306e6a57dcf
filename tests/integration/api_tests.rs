//! API integration tests for deploy, item lookup and error handling.
//!
//! Tests verify:
//! - Greeting and health endpoints
//! - Deploy stores a re-encoded outfit that reads back intact
//! - Error cases (bad body, missing field, download failure, undecodable document)
//! - HTTP response codes and headers

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value as Json};
use tower::ServiceExt;

use treepack::{from_json_bytes, to_json_bytes, EncodeOptions, FetchError, Map, Value};

use super::test_utils::{gradient, item_document, test_router, test_router_with, MockFetcher};

const ITEM_URL: &str = "http://upstream.test/items/jacket.json";

fn deploy_request(body: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/deploy")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Json {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn deploy(router: &Router, uuid: &str, version: i64) -> StatusCode {
    let request = deploy_request(&json!({
        "uuid": uuid,
        "url": ITEM_URL,
        "version": version,
        "master_idx": 0,
    }));
    router.clone().oneshot(request).await.unwrap().status()
}

// =============================================================================
// Basic Endpoints
// =============================================================================

#[tokio::test]
async fn test_root_greeting() {
    let router = test_router(MockFetcher::new()).await;

    let response = router.oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"message": "Hello World!"}));
}

#[tokio::test]
async fn test_health_endpoint() {
    let router = test_router(MockFetcher::new()).await;

    let response = router.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let result = body_json(response).await;
    assert_eq!(result["status"], "healthy");
    assert_eq!(result["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Deploy and Lookup
// =============================================================================

#[tokio::test]
async fn test_deploy_then_read_back() {
    let fetcher = MockFetcher::new().with_document(ITEM_URL, item_document());
    let counts = fetcher.request_counts();
    let router = test_router(fetcher).await;

    let response = router
        .clone()
        .oneshot(deploy_request(&json!({
            "uuid": "jacket-01",
            "url": ITEM_URL,
            "version": 2,
            "master_idx": 0,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"message": "ok"}));
    assert_eq!(counts.read().await.get(ITEM_URL), Some(&1));

    let response = router
        .oneshot(get_request("/items/outfit/jacket-01?version=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(response.headers().get("x-item-version").unwrap(), "2");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let stored = from_json_bytes(&body).unwrap();

    // A single item map is stored as a one-element sequence
    let items = stored.as_sequence().unwrap();
    assert_eq!(items.len(), 1);
    let item = items[0].as_map().unwrap();
    assert_eq!(item.get("name"), Some(&Value::from("jacket")));
    assert_eq!(item.get(0).unwrap().as_array().unwrap().shape(), &[2, 2]);
}

#[tokio::test]
async fn test_lookup_without_version_returns_latest() {
    let fetcher = MockFetcher::new().with_document(ITEM_URL, item_document());
    let router = test_router(fetcher).await;

    assert_eq!(deploy(&router, "coat", 1).await, StatusCode::OK);
    assert_eq!(deploy(&router, "coat", 4).await, StatusCode::OK);
    assert_eq!(deploy(&router, "coat", 3).await, StatusCode::OK);

    let response = router.clone().oneshot(get_request("/items/outfits/coat")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-item-version").unwrap(), "4");

    let response = router
        .oneshot(get_request("/items/outfit/coat?version=-1"))
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-item-version").unwrap(), "4");
}

#[tokio::test]
async fn test_large_arrays_take_image_path() {
    let item = Value::Map(
        Map::new()
            .with("name", "print")
            .with("texture", gradient(128, 128, 3)),
    );
    let document = to_json_bytes(&item, &EncodeOptions::default()).unwrap();
    assert!(!String::from_utf8_lossy(&document).contains("|image"));

    let fetcher = MockFetcher::new().with_document(ITEM_URL, document);
    let router = test_router(fetcher).await;
    assert_eq!(deploy(&router, "print", 0).await, StatusCode::OK);

    let response = router.oneshot(get_request("/items/outfit/print")).await.unwrap();
    let stored = body_json(response).await;
    assert!(stored[0].get("texture||image").is_some());
}

#[tokio::test]
async fn test_deploy_without_image_path_keeps_arrays() {
    let item = Value::Map(Map::new().with("texture", gradient(128, 128, 3)));
    let document = to_json_bytes(&item, &EncodeOptions::default()).unwrap();

    let fetcher = MockFetcher::new().with_document(ITEM_URL, document);
    let router = test_router_with(fetcher, EncodeOptions::default()).await;
    assert_eq!(deploy(&router, "plain", 0).await, StatusCode::OK);

    let response = router.oneshot(get_request("/items/outfit/plain")).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let stored = from_json_bytes(&body).unwrap();
    assert_eq!(stored, Value::Sequence(vec![item]));
}

// =============================================================================
// Request Errors
// =============================================================================

#[tokio::test]
async fn test_deploy_missing_field() {
    let fetcher = MockFetcher::new().with_document(ITEM_URL, item_document());
    let counts = fetcher.request_counts();
    let router = test_router(fetcher).await;

    let response = router
        .oneshot(deploy_request(&json!({"uuid": "x", "url": ITEM_URL})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let result = body_json(response).await;
    assert_eq!(result["error"], "invalid_request");
    assert!(result["message"].as_str().unwrap().contains("version"));

    // Validation happens before any download
    assert!(counts.read().await.is_empty());
}

#[tokio::test]
async fn test_deploy_malformed_body() {
    let router = test_router(MockFetcher::new()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/deploy")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_deploy_rejects_non_http_url() {
    let router = test_router(MockFetcher::new()).await;

    let response = router
        .oneshot(deploy_request(&json!({
            "uuid": "x",
            "url": "file:///etc/passwd",
            "version": 1,
            "master_idx": 0,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["message"]
        .as_str()
        .unwrap()
        .contains("scheme"));
}

#[tokio::test]
async fn test_item_unknown_kind() {
    let router = test_router(MockFetcher::new()).await;

    let response = router.oneshot(get_request("/items/hat/abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_item_not_found() {
    let router = test_router(MockFetcher::new()).await;

    let response = router
        .oneshot(get_request("/items/avatar/nobody"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

// =============================================================================
// Upstream Errors
// =============================================================================

#[tokio::test]
async fn test_deploy_unreachable_upstream() {
    let fetcher = MockFetcher::new().with_failure(
        ITEM_URL,
        FetchError::Unreachable("connection refused".to_string()),
    );
    let router = test_router(fetcher).await;

    let response = router
        .clone()
        .oneshot(deploy_request(&json!({
            "uuid": "a",
            "url": ITEM_URL,
            "version": 1,
            "master_idx": 0,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let result = body_json(response).await;
    assert_eq!(result["error"], "download_failed");
    assert!(result["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to download the file"));

    // Nothing was stored
    let response = router.oneshot(get_request("/items/outfit/a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deploy_empty_document() {
    for body in ["", "null", "{}", "[]"] {
        let fetcher = MockFetcher::new().with_document(ITEM_URL, body);
        let router = test_router(fetcher).await;

        let status = deploy(&router, "empty", 1).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY, "document {:?}", body);
    }
}

#[tokio::test]
async fn test_deploy_undecodable_document() {
    let fetcher =
        MockFetcher::new().with_document(ITEM_URL, r#"{"texture||array.zstd": "AAAA"}"#);
    let router = test_router(fetcher).await;

    let response = router
        .oneshot(deploy_request(&json!({
            "uuid": "bad",
            "url": ITEM_URL,
            "version": 1,
            "master_idx": 0,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let result = body_json(response).await;
    assert_eq!(result["error"], "internal_error");
    assert_eq!(result["message"], "Failed to process the item");
}
