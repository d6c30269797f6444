use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::{api, logging, middleware};

/// Builds the HTTP router with the ingress chain layered outermost-first:
/// access log, integrity check, envelope decrypt, gzip decompress, CIDR
/// filter, response gzip. The integrity check sits before decrypt so it
/// verifies the bytes the client signed, which are the bytes on the wire.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/update/{type}/{name}/{value}", post(api::update_path))
        .route("/update/", post(api::update_body))
        .route("/updates/", post(api::batch_update))
        .route("/value/{type}/{name}", get(api::get_path))
        .route("/value/", post(api::value_body))
        .route("/ping", get(api::ping))
        .route("/", get(api::dashboard))
        .layer(from_fn(middleware::response_gzip))
        .layer(from_fn_with_state(state.clone(), middleware::ip_filter))
        .layer(from_fn(middleware::decompress))
        .layer(from_fn_with_state(state.clone(), middleware::decrypt))
        .layer(from_fn_with_state(state.clone(), middleware::integrity_check))
        .layer(from_fn(logging::request_logging))
        .with_state(state)
}
