use std::fmt::Write as _;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use statmon_common::types::{Metric, MetricKind};

use crate::application::AppError;
use crate::state::AppState;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(reason) => {
                tracing::warn!(reason, "bad request");
                StatusCode::BAD_REQUEST.into_response()
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND.into_response(),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// `POST /update/{type}/{name}/{value}` — single metric, value in the path.
pub async fn update_path(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    let metric = match kind.parse::<MetricKind>() {
        Ok(MetricKind::Gauge) => {
            let value: f64 = value
                .parse()
                .map_err(|_| AppError::BadRequest(format!("can't parse gauge value: {value}")))?;
            Metric::gauge(name, value)
        }
        Ok(MetricKind::Counter) => {
            let delta: i64 = value
                .parse()
                .map_err(|_| AppError::BadRequest(format!("can't parse counter value: {value}")))?;
            Metric::counter(name, delta)
        }
        Err(_) => return Err(AppError::BadRequest(format!("unknown metric type: {kind}"))),
    };

    state.app.update_metric(&metric).await?;
    Ok(StatusCode::OK)
}

fn decode_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("can't parse json: {e}")))
}

/// `POST /update/` — single metric as a JSON body.
pub async fn update_body(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let metric: Metric = decode_json(&body)?;
    state.app.update_metric(&metric).await?;
    Ok(StatusCode::OK)
}

/// `POST /updates/` — batch of metrics as a JSON array.
pub async fn batch_update(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let batch: Vec<Metric> = decode_json(&body)?;
    state.app.update_metrics(&batch).await?;
    Ok(StatusCode::OK)
}

/// `GET /value/{type}/{name}` — metric value as plain text.
pub async fn get_path(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, AppError> {
    state.app.get_metric(&name, &kind).await
}

/// `POST /value/` — metric value as JSON, mirroring the request id and type.
pub async fn value_body(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Metric>, AppError> {
    let request: Metric = decode_json(&body)?;
    let value = state.app.get_metric(&request.id, &request.kind).await?;

    let mut response = Metric {
        value: None,
        delta: None,
        id: request.id,
        kind: request.kind,
    };
    match response.kind.parse::<MetricKind>() {
        Ok(MetricKind::Gauge) => {
            response.value = Some(value.parse().map_err(|e| {
                AppError::Internal(anyhow::anyhow!("stored gauge does not parse: {e}"))
            })?);
        }
        Ok(MetricKind::Counter) => {
            response.delta = Some(value.parse().map_err(|e| {
                AppError::Internal(anyhow::anyhow!("stored counter does not parse: {e}"))
            })?);
        }
        Err(_) => unreachable!("get_metric validated the kind"),
    }
    Ok(Json(response))
}

/// `GET /ping` — storage liveness.
pub async fn ping(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.app.ping().await?;
    Ok(StatusCode::OK)
}

/// Escapes text for interpolation into HTML. Metric names come straight from
/// request paths and JSON bodies, so they are untrusted markup.
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `GET /` — HTML table of gauges.
pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let rows = state.app.get_metrics().await?;

    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    \
         <title>Metrics</title>\n</head>\n<body>\n    <h1>Metrics</h1>\n    <table border=\"1\">\n        \
         <tr>\n            <th>Name</th>\n            <th>Value</th>\n        </tr>\n",
    );
    for (name, value) in &rows {
        let name = escape_html(name);
        let value = escape_html(value);
        let _ = write!(
            html,
            "        <tr>\n            <td>{name}</td>\n            <td>{value}</td>\n        </tr>\n"
        );
    }
    html.push_str("    </table>\n</body>\n</html>\n");

    Ok(Html(html))
}
