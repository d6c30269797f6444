#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use statmon_server::app;
use statmon_server::application::Application;
use statmon_server::state::AppState;
use statmon_storage::{MemoryStore, Store, StoreConfig};
use tower::util::ServiceExt;

pub fn memory_state() -> AppState {
    AppState::new(Arc::new(Application::new(Store::Memory(MemoryStore::new()))))
}

/// State over the snapshot-file backend, with the periodic task quiet so
/// tests drive persistence through `close`.
pub async fn file_state(path: &std::path::Path) -> AppState {
    let store = Store::open(&StoreConfig {
        file_path: Some(path.to_string_lossy().into_owned()),
        store_interval: std::time::Duration::from_secs(3600),
        restore: true,
        ..StoreConfig::default()
    })
    .await
    .unwrap();
    AppState::new(Arc::new(Application::new(store)))
}

pub fn build_app() -> Router {
    app::build_router(memory_state())
}

pub fn build_app_with(state: AppState) -> Router {
    app::build_router(state)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

/// Like [`send`] but also returns the response headers.
pub async fn send_full(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}
