use std::time::Instant;

use axum::body::Body;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Access-log middleware: URI, method, latency, status, and response size.
///
/// The response body is buffered to measure its size; every payload here is
/// a small JSON document or the dashboard page.
pub async fn request_logging(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    tracing::info!(
        uri = %uri,
        method = %method,
        latency_ms = start.elapsed().as_millis() as u64,
        status = status.as_u16(),
        size = bytes.len(),
        "request"
    );

    Response::from_parts(parts, Body::from(bytes))
}
