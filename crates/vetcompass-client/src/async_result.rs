//! Composable asynchronous results.
//!
//! [`AsyncResult`] is a boxed future resolving to an [`Outcome`]. The
//! combinators here chain dependent network calls so that only a successful
//! antecedent lets the next step run, while cancellation and failure flow
//! through untouched:
//!
//! ```no_run
//! use vetcompass_client::{AsyncResult, Outcome};
//!
//! # async fn example() {
//! let len = AsyncResult::success("rta".to_string())
//!     .map_success(|s| s.len())
//!     .flat_map_success(|n| AsyncResult::success(n * 2))
//!     .act_on_failure(|f| eprintln!("failed: {f}"));
//!
//! assert!(matches!(len.await, Outcome::Success(6)));
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::outcome::{CancelReason, Failure, Outcome};
use crate::timeout;

// ─────────────────────────────────────────────────────────────────────────────
// AsyncResult
// ─────────────────────────────────────────────────────────────────────────────

/// An asynchronous computation with a three-way outcome.
///
/// Like any Rust future it does nothing until polled, unless it was created
/// with [`spawn_on`](Self::spawn_on). Dropping an unresolved `AsyncResult`
/// aborts the work behind it.
#[must_use = "an AsyncResult does nothing unless awaited or spawned"]
pub struct AsyncResult<T> {
    inner: BoxFuture<'static, Outcome<T>>,
}

impl<T: Send + 'static> AsyncResult<T> {
    /// Wrap a future that resolves to an outcome.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// Wrap a fallible future; `Err` becomes a failure.
    pub fn from_result<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self::new(future.map(Outcome::from))
    }

    /// An already-successful result.
    pub fn success(value: T) -> Self {
        Self::new(futures::future::ready(Outcome::Success(value)))
    }

    /// An already-failed result.
    pub fn failed(failure: impl Into<Failure>) -> Self {
        Self::new(futures::future::ready(Outcome::Failed(failure.into())))
    }

    /// An already-cancelled result.
    pub fn cancelled(reason: CancelReason) -> Self {
        Self::new(futures::future::ready(Outcome::Cancelled(reason)))
    }

    /// Start running this computation on `handle` immediately.
    ///
    /// The returned result observes the spawned task. Dropping it aborts the
    /// task; a panicking task resolves as a failure.
    pub fn spawn_on(self, handle: &Handle) -> Self {
        let task = handle.spawn(self.inner);
        let guard = AbortOnDrop(task.abort_handle());

        Self::new(async move {
            let _guard = guard;
            match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Outcome::Cancelled(CancelReason::Requested),
                Err(e) => Outcome::Failed(Failure::new(Error::TaskAborted(e.to_string()))),
            }
        })
    }

    /// Apply `f` to a successful value.
    ///
    /// `f` runs exactly once, and only if this result succeeds. Cancellation
    /// and failure are passed through without calling `f`.
    pub fn map_success<U, F>(self, f: F) -> AsyncResult<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.try_map_success(move |value| Ok(f(value)))
    }

    /// Apply a fallible `f` to a successful value; an `Err` from `f` fails the
    /// returned result.
    pub fn try_map_success<U, F>(self, f: F) -> AsyncResult<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        AsyncResult::new(async move {
            match self.await {
                Outcome::Success(value) => Outcome::from(f(value)),
                Outcome::Cancelled(reason) => Outcome::Cancelled(reason),
                Outcome::Failed(failure) => Outcome::Failed(failure),
            }
        })
    }

    /// Start a dependent operation from a successful value.
    ///
    /// The returned result resolves when the nested operation resolves. An
    /// antecedent cancellation or failure short-circuits without calling `f`.
    pub fn flat_map_success<U, F>(self, f: F) -> AsyncResult<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> AsyncResult<U> + Send + 'static,
    {
        AsyncResult::new(async move {
            match self.await {
                Outcome::Success(value) => f(value).await,
                Outcome::Cancelled(reason) => Outcome::Cancelled(reason),
                Outcome::Failed(failure) => Outcome::Failed(failure),
            }
        })
    }

    /// Run `handler` as a side effect when this result fails.
    ///
    /// The handler sees the failure once; the returned result still reports
    /// the same failure afterwards. Success and cancellation skip the handler.
    pub fn act_on_failure<F>(self, handler: F) -> Self
    where
        F: FnOnce(&Failure) + Send + 'static,
    {
        AsyncResult::new(async move {
            let outcome = self.await;
            if let Outcome::Failed(failure) = &outcome {
                handler(failure);
            }
            outcome
        })
    }

    /// Race this result against a timer of `duration`.
    ///
    /// If the timer fires first the result is cancelled and the underlying
    /// work is dropped. See [`timeout::race`].
    pub fn cancel_after(self, duration: Duration) -> Self {
        AsyncResult::new(timeout::race(self, duration))
    }

    /// Resolve as cancelled as soon as `token` is cancelled.
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        AsyncResult::new(timeout::until_cancelled(self, token))
    }

    /// Turn this result into a handle that several observers can await.
    pub fn shared(self) -> SharedResult<T>
    where
        T: Clone + Sync,
    {
        SharedResult {
            inner: FutureExt::shared(self),
        }
    }

    /// Block the current thread until this result resolves.
    ///
    /// The computation runs on `handle`. Must not be called from within an
    /// async task, as it parks the calling thread.
    pub fn wait(self, handle: &Handle) -> Outcome<T> {
        futures::executor::block_on(self.spawn_on(handle))
    }
}

impl<T> Future for AsyncResult<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> std::fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncResult").finish_non_exhaustive()
    }
}

/// Aborts a spawned task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SharedResult
// ─────────────────────────────────────────────────────────────────────────────

/// A cloneable [`AsyncResult`] whose outcome is observed by every clone.
///
/// Used for the session ready-gate: every query chains off the same gate
/// and sees the same outcome of session creation.
pub struct SharedResult<T: Clone> {
    inner: Shared<AsyncResult<T>>,
}

impl<T: Clone + Send + Sync + 'static> SharedResult<T> {
    /// A new single-observer result that resolves with this one.
    pub fn observe(&self) -> AsyncResult<T> {
        AsyncResult::new(self.inner.clone())
    }

    /// The outcome, if already resolved.
    pub fn peek(&self) -> Option<&Outcome<T>> {
        self.inner.peek()
    }
}

impl<T: Clone> Clone for SharedResult<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Future for SharedResult<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl<T: Clone> std::fmt::Debug for SharedResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResult").finish_non_exhaustive()
    }
}
