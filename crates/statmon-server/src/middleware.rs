use std::io::Read;
use std::net::IpAddr;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ip_network::IpNetwork;
use rsa::Pkcs1v15Encrypt;
use statmon_common::sign;

use crate::state::AppState;

pub static HASH_HEADER: HeaderName = HeaderName::from_static("hashsha256");
pub static REAL_IP_HEADER: HeaderName = HeaderName::from_static("x-real-ip");

async fn buffer_request(req: Request) -> Result<(axum::http::request::Parts, Bytes), Response> {
    let (parts, body) = req.into_parts();
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => Ok((parts, bytes)),
        Err(e) => {
            tracing::warn!(error = %e, "can't read request body");
            Err(StatusCode::BAD_REQUEST.into_response())
        }
    }
}

/// Verifies `HashSHA256` against an HMAC-SHA256 of the bytes the client
/// actually sent, i.e. the wire body before decryption and decompression.
/// Active only when a hash key is configured; a missing, undecodable, or
/// mismatched header is a 400.
pub async fn integrity_check(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(key) = &state.hash_key else {
        return next.run(req).await;
    };

    let Some(digest) = req
        .headers()
        .get(&HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
    else {
        tracing::warn!("request without HashSHA256 header rejected");
        return StatusCode::BAD_REQUEST.into_response();
    };

    let (parts, bytes) = match buffer_request(req).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    if !sign::verify(key.as_bytes(), &bytes, &digest) {
        tracing::warn!("request body integrity check failed");
        return StatusCode::BAD_REQUEST.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Replaces an RSA envelope with its plaintext: decrypt with the private
/// key, then base64-decode. Active only when a private key is loaded;
/// failure at either step is a 400.
pub async fn decrypt(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(private_key) = &state.private_key else {
        return next.run(req).await;
    };

    let (parts, bytes) = match buffer_request(req).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    let plaintext = match private_key.decrypt(Pkcs1v15Encrypt, &bytes) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            tracing::warn!(error = %e, "can't decrypt request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let decoded = match base64::engine::general_purpose::STANDARD.decode(&plaintext) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, "can't decode decrypted body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    next.run(Request::from_parts(parts, Body::from(decoded))).await
}

/// Unwraps gzip request bodies when `Content-Encoding` says so. A body the
/// decoder cannot process is a 500, matching the contract for a failed
/// reader construction.
pub async fn decompress(req: Request, next: Next) -> Response {
    let is_gzip = req
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));
    if !is_gzip {
        return next.run(req).await;
    }

    let (parts, bytes) = match buffer_request(req).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    let mut decompressed = Vec::new();
    if let Err(e) = GzDecoder::new(&bytes[..]).read_to_end(&mut decompressed) {
        tracing::error!(error = %e, "can't decompress request body");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(decompressed))).await
}

/// Rejects requests whose `X-Real-IP` is missing, unparseable, or outside
/// the trusted subnet. Active only when a subnet is configured; a subnet
/// that itself does not parse is a 500.
pub async fn ip_filter(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(subnet) = &state.trusted_subnet else {
        return next.run(req).await;
    };

    let real_ip = req
        .headers()
        .get(&REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Ok(ip) = real_ip.parse::<IpAddr>() else {
        tracing::warn!(real_ip, "request without a valid X-Real-IP rejected");
        return StatusCode::FORBIDDEN.into_response();
    };

    let network = match subnet.parse::<IpNetwork>() {
        Ok(network) => network,
        Err(e) => {
            tracing::error!(error = %e, subnet = %subnet, "can't parse trusted subnet");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let allowed = match (network, ip) {
        (IpNetwork::V4(net), IpAddr::V4(ip)) => net.contains(ip),
        (IpNetwork::V6(net), IpAddr::V6(ip)) => net.contains(ip),
        _ => false,
    };
    if !allowed {
        tracing::warn!(%ip, subnet = %subnet, "ingress from outside the trusted subnet");
        return StatusCode::FORBIDDEN.into_response();
    }

    next.run(req).await
}

/// Gzips JSON and HTML responses for clients that advertise gzip support;
/// other content types pass through untouched.
pub async fn response_gzip(req: Request, next: Next) -> Response {
    let accepts_gzip = req
        .headers()
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("gzip"));
    if !accepts_gzip {
        return next.run(req).await;
    }

    let response = next.run(req).await;

    let compressible = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json") || ct.contains("text/html"));
    if !compressible {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "can't buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    use std::io::Write as _;
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    if let Err(e) = gz.write_all(&bytes) {
        tracing::error!(error = %e, "can't compress response body");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let compressed = match gz.finish() {
        Ok(compressed) => compressed,
        Err(e) => {
            tracing::error!(error = %e, "can't compress response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_ENCODING,
        axum::http::HeaderValue::from_static("gzip"),
    );
    Response::from_parts(parts, Body::from(compressed))
}
