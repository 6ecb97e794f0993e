//! Timeout and cancellation races.
//!
//! Both helpers resolve to exactly one of the source outcome or a
//! cancellation. The losing side is dropped as soon as the race is decided:
//! a fired timer aborts the in-flight operation, and a finished operation
//! releases its timer. A fired timeout is final even if the source would
//! have succeeded a moment later.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::async_result::AsyncResult;
use crate::outcome::{CancelReason, Outcome};

/// Race `source` against a timer of `duration`.
///
/// When both are ready in the same poll the source wins.
pub async fn race<T: Send + 'static>(source: AsyncResult<T>, duration: Duration) -> Outcome<T> {
    let timer = tokio::time::sleep(duration);

    tokio::select! {
        biased;
        outcome = source => outcome,
        () = timer => {
            debug!(timeout_ms = duration.as_millis() as u64, "operation timed out");
            Outcome::Cancelled(CancelReason::Timeout { after: duration })
        }
    }
}

/// Resolve `source`, or cancel as soon as `token` is cancelled.
///
/// An already-cancelled token wins without polling the source.
pub async fn until_cancelled<T: Send + 'static>(
    source: AsyncResult<T>,
    token: CancellationToken,
) -> Outcome<T> {
    tokio::select! {
        biased;
        () = token.cancelled() => Outcome::Cancelled(CancelReason::Requested),
        outcome = source => outcome,
    }
}
