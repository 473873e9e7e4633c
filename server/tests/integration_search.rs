use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::tempdir;
use tower::ServiceExt;
use warcsearch_core::persist::{save_index, IndexPaths};
use warcsearch_core::{IndexBuilder, IndexableDocument};

fn build_tiny_index(dir: &std::path::Path) {
    let builder = IndexBuilder::default();
    let docs = [
        ("<urn:0>", "Rust is great. rust systems programming with rust."),
        ("<urn:1>", "Learning rust."),
        ("<urn:2>", "Gardening notes about tomatoes."),
    ];
    for (i, (id, text)) in docs.iter().enumerate() {
        builder
            .insert(IndexableDocument::new(*id, format!("http://example.com/{i}"), "2014-03-28T10:00:00Z", *text))
            .unwrap();
    }
    save_index(&IndexPaths::new(dir), &builder.commit()).unwrap();
}

fn app() -> (tempfile::TempDir, Router) {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = warcsearch_server::build_app(&dir.path().to_string_lossy()).unwrap();
    (dir, app)
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn health_is_ok() {
    let (_dir, app) = app();
    let (status, body) = call(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (_dir, app) = app();
    let (status, body) = call(app, "/search?q=rust&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"].as_u64().unwrap(), 0);
    assert_eq!(arr[1]["doc_id"].as_u64().unwrap(), 1);
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
    assert_eq!(arr[0]["record_id"], "<urn:0>");
    assert!(arr[0]["snippet"].as_str().unwrap().contains("<em>Rust</em>"));
}

#[tokio::test]
async fn k_is_clamped() {
    let (_dir, app) = app();
    let (_, body) = call(app.clone(), "/search?q=rust&k=0").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 1);

    let (_, body) = call(app, "/search?q=rust&k=1000").await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn excluded_terms_filter_results() {
    let (_dir, app) = app();
    let (status, body) = call(app, "/search?q=%2Brust%20-learning").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let ids: Vec<u64> = json["results"].as_array().unwrap().iter().map(|r| r["doc_id"].as_u64().unwrap()).collect();
    assert_eq!(ids, vec![0]);
}

#[tokio::test]
async fn malformed_query_is_bad_request() {
    let (_dir, app) = app();
    let (status, body) = call(app, "/search?q=%22unterminated").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("unterminated"));
}

#[tokio::test]
async fn doc_lookup() {
    let (_dir, app) = app();
    let (status, body) = call(app.clone(), "/doc/2").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["target_uri"], "http://example.com/2");
    assert_eq!(json["text"], "Gardening notes about tomatoes.");

    let (status, _) = call(app, "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn missing_index_fails_to_load() {
    let dir = tempdir().unwrap();
    assert!(warcsearch_server::build_app(&dir.path().to_string_lossy()).is_err());
}
