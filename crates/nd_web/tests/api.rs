use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use nd_core::{CompletionModel, Error};
use nd_inference::models::{DummyModel, ScriptedModel};
use nd_inference::PromptSet;
use nd_storage::MemoryStorage;
use nd_web::{create_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app_with(model: Arc<dyn CompletionModel>) -> Router {
    let state = AppState::new(model, PromptSet::default(), Arc::new(MemoryStorage::new()));
    create_app(state).await
}

async fn offline_app() -> Router {
    app_with(Arc::new(DummyModel::new())).await
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_headline_step_route() {
    let model = ScriptedModel::fixed(r#"{"headline": "Dam Holds", "blobs": ["Water stays", "Town safe", "Crews rest", "More"]}"#);
    let app = app_with(Arc::new(model)).await;

    let (status, body) = send_json(&app, post("/api/steps/headline", json!({"text": "- dam holds", "blobs": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["headline"], "Dam Holds");
    assert_eq!(body["blobs"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_step_route_rejects_missing_fields_with_typed_body() {
    let app = offline_app().await;

    let (status, body) = send_json(&app, post("/api/steps/headline", json!({"text": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"headline": "", "blobs": []}));

    let (status, body) = send_json(&app, post("/api/steps/write", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"text": ""}));
}

#[tokio::test]
async fn test_step_route_rejects_malformed_bodies_with_typed_body() {
    let app = offline_app().await;

    let (status, body) = send_json(&app, post("/api/steps/write", json!({"text": null}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"text": ""}));

    let (status, body) = send_json(&app, post("/api/steps/headline", json!({"text": "x", "blobs": "two"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"headline": "", "blobs": []}));

    let garbled = Request::builder()
        .method("POST")
        .uri("/api/steps/quotes")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(&app, garbled).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"quotes": []}));
}

#[tokio::test]
async fn test_step_route_hides_generation_failures() {
    let model = ScriptedModel::new(|_| Err(Error::Inference("upstream 503".to_string())));
    let app = app_with(Arc::new(model)).await;

    let (status, body) = send_json(
        &app,
        post("/api/steps/rewrite", json!({"text": "Draft", "sources": [{"number": 1, "accredit": "AP", "text": "raw"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"text": ""}));
}

#[tokio::test]
async fn test_pipeline_route_errors() {
    let app = offline_app().await;
    let two_sources = json!({
        "mode": "digest",
        "sources": [
            {"number": 1, "accredit": "AP", "text": "one"},
            {"number": 2, "accredit": "Reuters", "text": "two"}
        ]
    });
    let (status, body) = send_json(&app, post("/api/pipeline", two_sources)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("exactly one source"));

    let failing = app_with(Arc::new(ScriptedModel::new(|_| Err(Error::Inference("boom".to_string()))))).await;
    let one_source = json!({"mode": "digest", "sources": [{"number": 1, "accredit": "AP", "text": "one"}]});
    let (status, body) = send_json(&failing, post("/api/pipeline", one_source)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Step 1 failed");
}

#[tokio::test]
async fn test_rich_content_route() {
    let app = offline_app().await;
    let html = r#"<p><span style="color:darkblue">Blue</span> <b>bold</b></p><p>Two</p>"#;

    let (status, body) = send_json(&app, post("/api/rich-content", json!({ "html": html }))).await;
    assert_eq!(status, StatusCode::OK);
    let blocks = body["root"]["children"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["type"], "paragraph");

    let (status, _) = send_json(&app, post("/api/rich-content", json!({"html": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_route() {
    let app = offline_app().await;
    let doc = json!({"headline": "Storm Passes", "metadata": "AP", "blobs": ["Calm"], "content": "All quiet."});

    let response = app.clone().oneshot(post("/api/export/html", doc.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"storm-passes.html\""
    );
    let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&html).contains("All quiet."));

    let (status, bytes) = send(&app, post("/api/export/docx", doc.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(b"PK"));

    let (status, body) = send_json(&app, post("/api/export/rtf", doc)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("rtf"));
}

#[tokio::test]
async fn test_article_versions() {
    let app = offline_app().await;
    let draft = json!({"headline": "Bridge Reopens", "content": "first", "sources": [{"number": 1, "accredit": "AP", "text": "x"}]});

    let (status, first) = send_json(&app, post("/api/articles", draft)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["slug"], "bridge-reopens");
    assert_eq!(first["version"], "1.0");

    let edit = json!({"slug": "bridge-reopens", "headline": "Bridge Reopens", "content": "edited", "bump": "minor"});
    let (_, second) = send_json(&app, post("/api/articles", edit)).await;
    assert_eq!(second["version"], "1.1");

    let (status, latest) = send_json(&app, get("/api/articles/bridge-reopens")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["content"], "edited");

    let (_, versions) = send_json(&app, get("/api/articles/bridge-reopens/versions")).await;
    assert_eq!(versions.as_array().unwrap().len(), 2);

    let (status, original) = send_json(&app, get("/api/articles/bridge-reopens/versions/1.0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(original["content"], "first");

    let (status, bytes) = send(&app, get("/api/articles/bridge-reopens/export/docx")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn test_unknown_article_is_404() {
    let app = offline_app().await;
    let (status, body) = send_json(&app, get("/api/articles/nothing-here")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nothing-here"));

    let (status, _) = send_json(&app, get("/api/articles/nothing-here/versions/2.0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, get("/api/articles/nothing-here/versions/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_presets_route() {
    let app = offline_app().await;
    let preset = json!({"name": "Brief", "instructions": "Keep it short", "blobs": 2, "length": {"min": 100, "max": 200}});

    let (status, saved) = send_json(&app, post("/api/orgs/acme/presets", preset)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["orgId"], "acme");

    let (_, listed) = send_json(&app, get("/api/orgs/acme/presets")).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "Brief");

    let (status, _) = send_json(&app, post("/api/orgs/acme/presets", json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
