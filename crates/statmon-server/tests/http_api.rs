mod common;

use axum::http::StatusCode;
use common::{build_app, get, post, post_json, send};

#[tokio::test]
async fn gauge_update_then_read_back() {
    let app = build_app();

    let (status, _) = send(&app, post("/update/gauge/Temp/23.5")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/value/gauge/Temp")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"23.5");
}

#[tokio::test]
async fn counter_accumulates_across_requests() {
    let app = build_app();

    send(&app, post("/update/counter/Hits/3")).await;
    send(&app, post("/update/counter/Hits/4")).await;

    let (status, body) = send(&app, get("/value/counter/Hits")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"7");
}

#[tokio::test]
async fn batch_coalesces_counters_and_gauges() {
    let app = build_app();

    let batch = r#"[
        {"id":"A","type":"counter","delta":2},
        {"id":"A","type":"counter","delta":5},
        {"id":"B","type":"gauge","value":1.25}
    ]"#;
    let (status, _) = send(&app, post_json("/updates/", batch)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/value/counter/A")).await;
    assert_eq!(body, b"7");
    let (_, body) = send(&app, get("/value/gauge/B")).await;
    assert_eq!(body, b"1.25");
}

#[tokio::test]
async fn empty_metric_name_is_404() {
    let app = build_app();
    let (status, _) = send(&app, post("/update/gauge//1.0")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_metric_type_is_400() {
    let app = build_app();
    let (status, _) = send(&app, post("/update/histogram/X/1.0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/value/histogram/X")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fractional_counter_value_is_400() {
    let app = build_app();
    let (status, _) = send(&app, post("/update/counter/Hits/1.5")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn nan_gauge_is_accepted() {
    let app = build_app();
    let (status, _) = send(&app, post("/update/gauge/Odd/nan")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/value/gauge/Odd")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"NaN");
}

#[tokio::test]
async fn unknown_metric_read_is_404() {
    let app = build_app();
    let (status, _) = send(&app, get("/value/gauge/absent")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn single_metric_json_update() {
    let app = build_app();

    let (status, _) = send(
        &app,
        post_json("/update/", r#"{"id":"Load","type":"gauge","value":0.75}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/value/gauge/Load")).await;
    assert_eq!(body, b"0.75");
}

#[tokio::test]
async fn json_value_read_mirrors_id_and_type() {
    let app = build_app();
    send(&app, post("/update/counter/Hits/42")).await;

    let (status, body) = send(
        &app,
        post_json("/value/", r#"{"id":"Hits","type":"counter"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["id"], "Hits");
    assert_eq!(json["type"], "counter");
    assert_eq!(json["delta"], 42);
    assert!(json.get("value").is_none());
}

#[tokio::test]
async fn malformed_json_envelope_is_400() {
    let app = build_app();
    for uri in ["/update/", "/updates/", "/value/"] {
        let (status, _) = send(&app, post_json(uri, "{broken")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn batch_skips_malformed_items_but_applies_the_rest() {
    let app = build_app();

    let batch = r#"[
        {"id":"ok","type":"gauge","value":2.5},
        {"id":"","type":"gauge","value":1.0},
        {"id":"odd","type":"histogram","value":1.0},
        {"id":"bare","type":"counter"}
    ]"#;
    let (status, _) = send(&app, post_json("/updates/", batch)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/value/gauge/ok")).await;
    assert_eq!(body, b"2.5");
    let (status, _) = send(&app, get("/value/counter/bare")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ping_reports_liveness() {
    let app = build_app();
    let (status, _) = send(&app, get("/ping")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn dashboard_lists_gauges_as_html() {
    let app = build_app();
    send(&app, post("/update/gauge/Temp/23.5")).await;
    send(&app, post("/update/counter/Hits/1")).await;

    let (status, headers, body) = common::send_full(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("text/html"));

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("<table"));
    assert!(html.contains("<td>Temp</td>"));
    assert!(html.contains("<td>23.5</td>"));
    // Counters stay off the dashboard.
    assert!(!html.contains("<td>Hits</td>"));
}

#[tokio::test]
async fn dashboard_escapes_hostile_metric_names() {
    let app = build_app();
    send(
        &app,
        post_json(
            "/update/",
            r#"{"id":"<script>alert(1)</script>","type":"gauge","value":1.0}"#,
        ),
    )
    .await;

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
}

#[tokio::test]
async fn file_backed_state_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("snap.json");

    let state = common::file_state(&path).await;
    let app = common::build_app_with(state.clone());
    send(&app, post("/update/gauge/Temp/23.5")).await;
    send(&app, post("/update/counter/Hits/7")).await;
    state.app.close().await.unwrap();

    let state = common::file_state(&path).await;
    let app = common::build_app_with(state);
    let (_, body) = send(&app, get("/value/gauge/Temp")).await;
    assert_eq!(body, b"23.5");
    let (_, body) = send(&app, get("/value/counter/Hits")).await;
    assert_eq!(body, b"7");
}

#[tokio::test]
async fn wrong_method_is_405() {
    let app = build_app();
    let (status, _) = send(&app, get("/update/gauge/Temp/1.0")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
