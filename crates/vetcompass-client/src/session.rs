//! Coding session lifecycle.
//!
//! A [`CodingSession`] is created on the service once (`start`) or picked up
//! by id (`resume`). Creation runs eagerly on the session's runtime and its
//! outcome becomes the session's ready-gate: every query and selection chains
//! off the gate, so callers can issue queries immediately after `start`
//! without waiting for the service to answer.
//!
//! ```text
//! NotStarted ──start──▶ Starting ──ok──────▶ Ready
//!     │                    │ ──fail────▶ Faulted
//!     │                    └ ──cancel──▶ Cancelled
//!     └────resume─▶ Resuming ──────────▶ Ready
//! ```
//!
//! A failed selection also faults the session. Faulted is terminal.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::async_result::{AsyncResult, SharedResult};
use crate::client::ServiceClient;
use crate::error::{Error, Result};
use crate::outcome::{Failure, Outcome};
use crate::transport::TransportResponse;
use crate::types::{CodingSubject, Query, QueryResponse, Selection};

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    /// Creation request in flight.
    Starting,
    Resuming,
    Ready,
    /// Creation or a selection failed; see [`CodingSession::fault`].
    Faulted,
    /// Creation timed out or the session was cancelled before it was ready.
    Cancelled,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::NotStarted => "not started",
            SessionState::Starting => "starting",
            SessionState::Resuming => "resuming",
            SessionState::Ready => "ready",
            SessionState::Faulted => "faulted",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// The failure that faulted a session.
#[derive(Debug, Clone)]
pub struct Fault {
    /// Every cause, with nested aggregates flattened.
    pub failure: Failure,
    /// Body of the server's error response, when there was one.
    pub server_message: Option<String>,
}

/// State shared with the continuations that settle it.
///
/// Kept apart from the session itself so spawned work never holds the
/// ready-gate alive.
#[derive(Debug)]
struct StatusCell {
    inner: Mutex<Status>,
}

#[derive(Debug)]
struct Status {
    state: SessionState,
    fault: Option<Fault>,
}

impl StatusCell {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Status {
                state: SessionState::NotStarted,
                fault: None,
            }),
        }
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    fn fault(&self) -> Option<Fault> {
        self.inner.lock().fault.clone()
    }

    fn set(&self, state: SessionState) {
        self.inner.lock().state = state;
    }

    /// Move to `to` only from one of `from`.
    fn transition(&self, from: &[SessionState], to: SessionState) -> bool {
        let mut status = self.inner.lock();
        if from.contains(&status.state) {
            status.state = to;
            true
        } else {
            false
        }
    }

    /// Record `failure` as the session fault. The first fault wins.
    fn record_fault(&self, session_id: Option<Uuid>, failure: &Failure) {
        let failure = failure.flatten();
        let server_message = failure.causes().iter().find_map(|c| c.server_body());

        let mut status = self.inner.lock();
        if status.fault.is_some() {
            debug!(?session_id, error = %failure, "session already faulted, keeping first fault");
            return;
        }
        warn!(
            ?session_id,
            error = %failure,
            server_message = server_message.as_deref().unwrap_or(""),
            "coding session faulted"
        );
        status.fault = Some(Fault {
            failure,
            server_message,
        });
        status.state = SessionState::Faulted;
    }
}

/// Set once `start` or `resume` has run.
#[derive(Debug)]
struct Started {
    session_id: Uuid,
    session_url: Url,
    gate: SharedResult<()>,
}

// ─────────────────────────────────────────────────────────────────────────────
// CodingSession
// ─────────────────────────────────────────────────────────────────────────────

/// A coding session for one subject.
///
/// Sessions are created by a [`CodingSessionFactory`](crate::CodingSessionFactory).
/// Dropping a session aborts its in-flight creation request.
#[derive(Debug)]
pub struct CodingSession {
    client: ServiceClient,
    subject: CodingSubject,
    timeout: Option<Duration>,
    cancellation: CancellationToken,
    status: Arc<StatusCell>,
    started: Mutex<Option<Started>>,
}

impl CodingSession {
    pub(crate) fn new(
        client: ServiceClient,
        subject: CodingSubject,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            subject,
            timeout,
            cancellation: CancellationToken::new(),
            status: Arc::new(StatusCell::new()),
            started: Mutex::new(None),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Create the session on the service.
    ///
    /// Returns as soon as the creation request has been dispatched; its
    /// outcome is observed through [`ready`](Self::ready) and by every query.
    /// Calling `start` on a session that has already been started or resumed
    /// does nothing.
    ///
    /// Must be called within the session's runtime or with one available
    /// through the factory.
    pub fn start(&self) -> Result<()> {
        let mut started = self.started.lock();
        if let Some(existing) = started.as_ref() {
            debug!(session_id = %existing.session_id, "start ignored, session already started");
            return Ok(());
        }

        let session_id = Uuid::new_v4();
        let session_url = self.client.session_url(session_id)?;
        let request = self.client.creation_request(&session_url, &self.subject)?;

        let mut creation = self.client.send(request).map_success(|_| ());
        if let Some(timeout) = self.timeout {
            creation = creation.cancel_after(timeout);
        }

        let faults = Arc::clone(&self.status);
        let settle = Arc::clone(&self.status);
        let creation = creation
            .with_cancellation(self.cancellation.child_token())
            .act_on_failure(move |failure| faults.record_fault(Some(session_id), failure));
        let creation = AsyncResult::new(async move {
            let outcome = creation.await;
            match &outcome {
                Outcome::Success(()) => {
                    if settle.transition(&[SessionState::Starting], SessionState::Ready) {
                        info!(%session_id, "coding session ready");
                    }
                }
                Outcome::Cancelled(reason) => {
                    if settle.transition(&[SessionState::Starting], SessionState::Cancelled) {
                        warn!(%session_id, %reason, "coding session creation cancelled");
                    }
                }
                Outcome::Failed(_) => {}
            }
            outcome
        });

        self.status.set(SessionState::Starting);
        debug!(
            %session_id,
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            "starting coding session"
        );
        let gate = creation.spawn_on(self.client.runtime()).shared();

        *started = Some(Started {
            session_id,
            session_url,
            gate,
        });
        Ok(())
    }

    /// Attach to a session that already exists on the service.
    ///
    /// No request is made; the session is ready immediately. Fails with
    /// [`Error::AlreadyStarted`] if the session was started or resumed before.
    pub fn resume(&self, session_id: Uuid) -> Result<()> {
        let mut started = self.started.lock();
        if started.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let session_url = self.client.session_url(session_id)?;
        self.status.set(SessionState::Resuming);
        let gate = AsyncResult::success(()).shared();
        self.status.set(SessionState::Ready);
        info!(%session_id, "coding session resumed");

        *started = Some(Started {
            session_id,
            session_url,
            gate,
        });
        Ok(())
    }

    /// Cancel the session.
    ///
    /// Pending creation, queries and selections resolve as cancelled. A
    /// session that was still starting moves to [`SessionState::Cancelled`].
    pub fn cancel(&self) {
        self.cancellation.cancel();
        self.status
            .transition(&[SessionState::Starting], SessionState::Cancelled);
        debug!(session_id = ?self.session_id(), "coding session cancelled");
    }

    /// The session's ready-gate.
    ///
    /// Resolves with the outcome of session creation; immediately successful
    /// for a resumed session.
    pub fn ready(&self) -> Result<AsyncResult<()>> {
        let started = self.started.lock();
        let started = started.as_ref().ok_or(Error::NotStarted)?;
        Ok(started.gate.observe())
    }

    // ── Operations ──────────────────────────────────────────────────────────

    /// Search the service for codes matching `query`.
    ///
    /// The search waits for the ready-gate. If session creation fails or is
    /// cancelled the query resolves the same way without reaching the
    /// service. A failed query does not fault the session.
    ///
    /// Fails synchronously with [`Error::NotStarted`] or
    /// [`Error::SessionFaulted`].
    pub fn query_async(&self, query: Query) -> Result<AsyncResult<QueryResponse>> {
        let (gate, session_url) = self.dispatchable()?;
        let client = self.client.clone();

        debug!(session_id = ?self.session_id(), expression = query.search_expression(), "query");
        let mut result = gate.flat_map_success(move |()| client.search(&session_url, &query));
        if let Some(timeout) = self.timeout {
            result = result.cancel_after(timeout);
        }
        Ok(result.with_cancellation(self.cancellation.child_token()))
    }

    /// Search and block until the response arrives.
    ///
    /// Runs the query on the session's runtime. Returns
    /// [`Error::BlockingInRuntime`] without sending anything when called from
    /// a thread that is driving a runtime.
    pub fn query_sync(&self, query: Query) -> Result<QueryResponse> {
        if Handle::try_current().is_ok() {
            return Err(Error::BlockingInRuntime);
        }
        self.query_async(query)?
            .wait(self.client.runtime())
            .into_result()
    }

    /// Tell the service which code the user chose.
    ///
    /// Waits for the ready-gate like a query. Unlike a query, a failed
    /// selection faults the session.
    ///
    /// Fails synchronously with [`Error::NotStarted`] or
    /// [`Error::SessionFaulted`].
    pub fn register_selection(&self, selection: Selection) -> Result<AsyncResult<TransportResponse>> {
        let (gate, session_url) = self.dispatchable()?;
        let client = self.client.clone();
        let timeout = self.timeout;
        let session_id = self.session_id();
        let faults = Arc::clone(&self.status);

        debug!(?session_id, venom_id = selection.venom_id, "register selection");
        let result = gate
            .flat_map_success(move |()| {
                let post = client.post_selection(&session_url, &selection);
                match timeout {
                    Some(timeout) => post.cancel_after(timeout),
                    None => post,
                }
            })
            .act_on_failure(move |failure| faults.record_fault(session_id, failure));
        Ok(result.with_cancellation(self.cancellation.child_token()))
    }

    // ── Observers ───────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    /// Check if `start` or `resume` has been called.
    pub fn is_started(&self) -> bool {
        self.started.lock().is_some()
    }

    pub fn is_faulted(&self) -> bool {
        self.status.state() == SessionState::Faulted
    }

    /// The failure that faulted the session, if it has faulted.
    pub fn fault(&self) -> Option<Fault> {
        self.status.fault()
    }

    /// Server error text captured when the session faulted.
    pub fn server_error_message(&self) -> Option<String> {
        self.status.fault().and_then(|f| f.server_message)
    }

    /// Session id, once started or resumed.
    pub fn session_id(&self) -> Option<Uuid> {
        self.started.lock().as_ref().map(|s| s.session_id)
    }

    /// Absolute URL of the session resource, once started or resumed.
    pub fn session_url(&self) -> Option<Url> {
        self.started.lock().as_ref().map(|s| s.session_url.clone())
    }

    pub fn subject(&self) -> &CodingSubject {
        &self.subject
    }

    /// Timeout applied to creation, queries and selections.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The gate and session URL for a new operation, or why there is none.
    fn dispatchable(&self) -> Result<(AsyncResult<()>, Url)> {
        if self.is_faulted() {
            return Err(Error::SessionFaulted);
        }
        let started = self.started.lock();
        let started = started.as_ref().ok_or(Error::NotStarted)?;
        Ok((started.gate.observe(), started.session_url.clone()))
    }
}
