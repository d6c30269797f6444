use serde::{Deserialize, Serialize};

pub const GAUGE: &str = "gauge";
pub const COUNTER: &str = "counter";

/// The two metric semantics the pipeline understands.
///
/// A gauge is replaced on every write; a counter accumulates deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "{GAUGE}"),
            MetricKind::Counter => write!(f, "{COUNTER}"),
        }
    }
}

impl std::str::FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            GAUGE => Ok(MetricKind::Gauge),
            COUNTER => Ok(MetricKind::Counter),
            _ => Err(format!("unknown metric kind: {s}")),
        }
    }
}

/// One metric report as it travels over the wire.
///
/// `kind` stays a plain string here: a batch may carry items of a kind this
/// build does not know, and the ingest path skips those individually instead
/// of rejecting the whole envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Gauge reading, present only when `kind` is `gauge`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Counter increment, present only when `kind` is `counter`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            value: Some(value),
            delta: None,
            id: id.into(),
            kind: GAUGE.to_string(),
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            value: None,
            delta: Some(delta),
            id: id.into(),
            kind: COUNTER.to_string(),
        }
    }
}
