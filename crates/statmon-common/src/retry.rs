//! Data-driven retry policy used by the HTTP client and the database store.
//!
//! The policy is a plain table of sleep intervals so tests can substitute a
//! zero-wait variant. The caller supplies the transient-error classifier;
//! anything the classifier rejects returns immediately.

use std::future::Future;
use std::time::Duration;

/// Sleep intervals between attempts. An operation runs at most
/// `intervals.len() + 1` times.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub intervals: &'static [Duration],
}

/// The production schedule: three retries at 1 s, 3 s, 5 s.
pub const DEFAULT_BACKOFF: Backoff = Backoff {
    intervals: &[
        Duration::from_secs(1),
        Duration::from_secs(3),
        Duration::from_secs(5),
    ],
};

/// Zero-wait schedule for tests.
pub const NO_WAIT: Backoff = Backoff {
    intervals: &[Duration::ZERO, Duration::ZERO, Duration::ZERO],
};

/// Runs `op`, retrying per `policy` while `is_transient` classifies the error
/// as connection-class. The last error is returned once the schedule is
/// exhausted.
pub async fn retry<T, E, F, Fut>(
    policy: Backoff,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    for interval in policy.intervals {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) => {
                tokio::time::sleep(*interval).await;
            }
            Err(e) => return Err(e),
        }
    }
    op().await
}
