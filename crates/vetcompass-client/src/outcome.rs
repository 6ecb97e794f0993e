//! Three-way outcome of an asynchronous operation.
//!
//! Every operation in this crate resolves to exactly one of success,
//! cancellation or failure. Cancellation is never reported as a failure and a
//! failure is never silently dropped: a [`Failure`] keeps every cause it has
//! accumulated on its way down a chain.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal result of an [`AsyncResult`](crate::AsyncResult).
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The operation completed with a value.
    Success(T),
    /// The operation was cancelled (timeout or explicit request).
    Cancelled(CancelReason),
    /// The operation failed.
    Failed(Failure),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The success value, if any.
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(v) => Some(v),
            _ => None,
        }
    }

    /// The failure, if any.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(f) => Some(f),
            _ => None,
        }
    }

    /// The cancellation reason, if any.
    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Self::Cancelled(r) => Some(r),
            _ => None,
        }
    }

    /// Map the success value, leaving cancellation and failure untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(v) => Outcome::Success(f(v)),
            Self::Cancelled(r) => Outcome::Cancelled(r),
            Self::Failed(e) => Outcome::Failed(e),
        }
    }

    /// Convert into the crate `Result`.
    ///
    /// Cancellation becomes [`Error::Cancelled`] and a failure becomes
    /// [`Error::Failed`] carrying all of its causes.
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Cancelled(r) => Err(Error::Cancelled(r)),
            Self::Failed(f) => Err(Error::Failed(f)),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(v) => Self::Success(v),
            Err(Error::Cancelled(r)) => Self::Cancelled(r),
            Err(Error::Failed(f)) => Self::Failed(f),
            Err(e) => Self::Failed(Failure::new(e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Why an operation was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// A `cancel_after` timer fired before the operation finished.
    Timeout {
        /// The duration the operation was given.
        after: Duration,
    },
    /// Cancellation was requested through a token, or the task was aborted.
    Requested,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Timeout { after } => {
                write!(f, "timed out after {}ms", after.as_millis())
            }
            CancelReason::Requested => write!(f, "cancellation requested"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Failure
// ─────────────────────────────────────────────────────────────────────────────

/// One or more errors that caused an operation to fail.
///
/// Causes are reference counted so the same failure can be observed by every
/// dependent of a shared result. The first cause is the root cause.
#[derive(Debug, Clone)]
pub struct Failure {
    causes: Vec<Arc<Error>>,
}

impl Failure {
    /// Create a failure from a single error.
    pub fn new(error: Error) -> Self {
        Self {
            causes: vec![Arc::new(error)],
        }
    }

    /// The first (original) cause.
    pub fn root_cause(&self) -> &Error {
        &self.causes[0]
    }

    /// All causes in the order they were recorded.
    pub fn causes(&self) -> &[Arc<Error>] {
        &self.causes
    }

    /// Append another cause, keeping the existing ones.
    pub fn with_cause(mut self, error: Error) -> Self {
        self.causes.push(Arc::new(error));
        self
    }

    /// Append every cause of `other` after this failure's causes.
    pub fn merge(mut self, other: Failure) -> Self {
        self.causes.extend(other.causes);
        self
    }

    /// Replace causes that are themselves aggregates with their own causes.
    pub fn flatten(&self) -> Failure {
        let mut causes = Vec::with_capacity(self.causes.len());
        for cause in &self.causes {
            match cause.as_ref() {
                Error::Failed(inner) => causes.extend(inner.flatten().causes),
                _ => causes.push(Arc::clone(cause)),
            }
        }
        Failure { causes }
    }

    /// Check whether two failures share the same root cause instance.
    pub fn same_root(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.causes[0], &other.causes[0])
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Failure::new(error)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root_cause())?;
        if self.causes.len() > 1 {
            write!(f, " (and {} more)", self.causes.len() - 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_map_preserves_failure() {
        let failure = Failure::new(Error::Transport("down".into()));
        let outcome: Outcome<u32> = Outcome::Failed(failure.clone());
        let mapped = outcome.map(|v| v + 1);
        assert!(mapped.failure().unwrap().same_root(&failure));
    }

    #[test]
    fn test_outcome_from_result() {
        let ok = Outcome::from(Ok::<u8, Error>(3));
        assert_eq!(ok.success(), Some(3));

        let cancelled =
            Outcome::from(Err::<u8, Error>(Error::Cancelled(CancelReason::Requested)));
        assert_eq!(cancelled.cancel_reason(), Some(&CancelReason::Requested));

        let failed = Outcome::from(Err::<u8, Error>(Error::NotStarted));
        assert!(matches!(
            failed.failure().unwrap().root_cause(),
            Error::NotStarted
        ));
    }

    #[test]
    fn test_into_result_keeps_cancellation_distinct() {
        let outcome: Outcome<()> = Outcome::Cancelled(CancelReason::Timeout {
            after: Duration::from_millis(50),
        });
        let err = outcome.into_result().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Operation cancelled: timed out after 50ms");
    }

    #[test]
    fn test_failure_aggregates_causes() {
        let failure = Failure::new(Error::Transport("first".into()))
            .with_cause(Error::Transport("second".into()));
        assert_eq!(failure.causes().len(), 2);
        assert_eq!(failure.root_cause().to_string(), "Transport error: first");
        assert_eq!(failure.to_string(), "Transport error: first (and 1 more)");
    }

    #[test]
    fn test_failure_merge_keeps_order() {
        let a = Failure::new(Error::Transport("a".into()));
        let b = Failure::new(Error::Transport("b".into()));
        let merged = a.clone().merge(b);
        assert!(merged.same_root(&a));
        assert_eq!(merged.causes()[1].to_string(), "Transport error: b");
    }

    #[test]
    fn test_failure_flatten_unwraps_nested() {
        let inner = Failure::new(Error::Transport("inner".into()))
            .with_cause(Error::Transport("inner2".into()));
        let outer = Failure::new(Error::Failed(inner.clone()))
            .with_cause(Error::Transport("outer".into()));

        let flat = outer.flatten();
        assert_eq!(flat.causes().len(), 3);
        assert!(flat.same_root(&inner));
    }
}
