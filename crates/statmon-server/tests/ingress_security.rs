mod common;

use std::io::{Read, Write};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::Engine as _;
use common::{build_app_with, get, memory_state, post_json, send, send_full};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use statmon_common::sign;

const BATCH: &str = r#"[{"id":"Temp","type":"gauge","value":23.5}]"#;

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(data).unwrap();
    gz.finish().unwrap()
}

fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out).unwrap();
    out
}

fn gzipped_batch_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(gzip(BATCH.as_bytes())))
        .unwrap()
}

#[tokio::test]
async fn gzipped_request_body_is_decompressed() {
    let app = build_app_with(memory_state());

    let (status, _) = send(&app, gzipped_batch_request()).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/value/gauge/Temp")).await;
    assert_eq!(body, b"23.5");
}

#[tokio::test]
async fn json_response_is_gzipped_for_gzip_clients() {
    let app = build_app_with(memory_state());
    send(&app, post_json("/update/", r#"{"id":"A","type":"gauge","value":1.5}"#)).await;

    let request = Request::builder()
        .method("POST")
        .uri("/value/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::from(r#"{"id":"A","type":"gauge"}"#))
        .unwrap();
    let (status, headers, body) = send_full(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_ENCODING).unwrap(), "gzip");
    let json: serde_json::Value = serde_json::from_slice(&gunzip(&body)).unwrap();
    assert_eq!(json["value"], 1.5);
}

#[tokio::test]
async fn html_response_is_gzipped_but_plain_text_is_not() {
    let app = build_app_with(memory_state());
    send(&app, post_json("/update/", r#"{"id":"A","type":"gauge","value":1.5}"#)).await;

    let mut request = get("/");
    request
        .headers_mut()
        .insert(header::ACCEPT_ENCODING, "gzip".parse().unwrap());
    let (_, headers, body) = send_full(&app, request).await;
    assert_eq!(headers.get(header::CONTENT_ENCODING).unwrap(), "gzip");
    assert!(String::from_utf8(gunzip(&body)).unwrap().contains("<table"));

    // The plain-text value endpoint bypasses the compressor.
    let mut request = get("/value/gauge/A");
    request
        .headers_mut()
        .insert(header::ACCEPT_ENCODING, "gzip".parse().unwrap());
    let (_, headers, body) = send_full(&app, request).await;
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body, b"1.5");
}

#[tokio::test]
async fn integrity_check_mirrors_the_client_signature() {
    let state = memory_state().with_hash_key(Some("secret".to_string()));
    let app = build_app_with(state);

    // Wrong digest.
    let mut request = post_json("/updates/", BATCH);
    request
        .headers_mut()
        .insert("HashSHA256", "deadbeef".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Missing header.
    let (status, _) = send(&app, post_json("/updates/", BATCH)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Digest over the body, exactly as the client computes it.
    let digest = sign::sign(b"secret", BATCH.as_bytes());
    let mut request = post_json("/updates/", BATCH);
    request
        .headers_mut()
        .insert("HashSHA256", digest.parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn signed_gzip_body_verifies_against_wire_bytes() {
    let state = memory_state().with_hash_key(Some("secret".to_string()));
    let app = build_app_with(state);

    let wire_body = gzip(BATCH.as_bytes());
    let digest = sign::sign(b"secret", &wire_body);
    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header("HashSHA256", digest)
        .body(Body::from(wire_body))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/value/gauge/Temp")).await;
    assert_eq!(body, b"23.5");
}

#[tokio::test]
async fn cidr_filter_rejects_outside_addresses() {
    let state = memory_state().with_trusted_subnet(Some("10.0.0.0/8".to_string()));
    let app = build_app_with(state);

    let mut request = gzipped_batch_request();
    request
        .headers_mut()
        .insert("X-Real-IP", "192.168.1.1".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // No header at all.
    let (status, _) = send(&app, gzipped_batch_request()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unparseable address.
    let mut request = gzipped_batch_request();
    request
        .headers_mut()
        .insert("X-Real-IP", "not-an-ip".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut request = gzipped_batch_request();
    request
        .headers_mut()
        .insert("X-Real-IP", "10.1.2.3".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn misconfigured_subnet_is_500() {
    let state = memory_state().with_trusted_subnet(Some("not-a-cidr".to_string()));
    let app = build_app_with(state);

    let mut request = gzipped_batch_request();
    request
        .headers_mut()
        .insert("X-Real-IP", "10.1.2.3".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

fn encrypt_envelope(public: &RsaPublicKey, compressed: &[u8]) -> Vec<u8> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);
    public
        .encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, encoded.as_bytes())
        .unwrap()
}

#[tokio::test]
async fn rsa_envelope_is_unwrapped_before_the_handler() {
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let public = RsaPublicKey::from(&private);
    let state = memory_state().with_private_key(Some(private));
    let app = build_app_with(state);

    let body = encrypt_envelope(&public, &gzip(BATCH.as_bytes()));
    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(body))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/value/gauge/Temp")).await;
    assert_eq!(body, b"23.5");
}

#[tokio::test]
async fn undecryptable_envelope_is_400() {
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let state = memory_state().with_private_key(Some(private));
    let app = build_app_with(state);

    let (status, _) = send(&app, post_json("/updates/", "garbage-not-rsa")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_agent_pipeline_signature_encryption_and_gzip() {
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let public = RsaPublicKey::from(&private);
    let state = memory_state()
        .with_hash_key(Some("secret".to_string()))
        .with_private_key(Some(private))
        .with_trusted_subnet(Some("10.0.0.0/8".to_string()));
    let app = build_app_with(state);

    // Exactly the client pipeline: gzip, base64+RSA, then sign what is sent.
    let wire_body = encrypt_envelope(&public, &gzip(BATCH.as_bytes()));
    let digest = sign::sign(b"secret", &wire_body);

    let request = Request::builder()
        .method("POST")
        .uri("/updates/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header("HashSHA256", digest)
        .header("X-Real-IP", "10.1.2.3")
        .body(Body::from(wire_body))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, get("/value/gauge/Temp")).await;
    assert_eq!(body, b"23.5");
}
