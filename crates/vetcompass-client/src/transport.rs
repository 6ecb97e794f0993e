//! HTTP transport.
//!
//! The session never talks to reqwest directly; it hands a fully signed
//! [`HttpRequest`] to a [`Transport`] and gets back a buffered
//! [`TransportResponse`]. [`HttpTransport`] is the production implementation
//! and [`MockTransport`] a scripted one for tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Request / Response
// ─────────────────────────────────────────────────────────────────────────────

/// A request ready to be sent.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: Url,
    /// Request headers, including the signature headers once signed.
    pub headers: HeaderMap,
    /// Request body (POST only).
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Create a POST request with a body.
    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: HeaderMap::new(),
            body: Some(body.into()),
        }
    }

    /// Length of the body in bytes (0 when there is none).
    pub fn content_length(&self) -> usize {
        self.body.as_ref().map_or(0, Bytes::len)
    }

    /// Value of a header as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response with a status and body and no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Check if the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Pass a 2xx response through, or turn anything else into
    /// [`Error::Status`] carrying the body.
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Status {
                status: self.status,
                body: self.body,
            })
        }
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport trait
// ─────────────────────────────────────────────────────────────────────────────

/// Sends signed requests to the coding service.
///
/// Implementations must be cancel-safe: dropping the returned future abandons
/// the request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and buffer the whole response.
    ///
    /// Non-success statuses are returned as responses, not errors; only
    /// failures to reach the server are errors.
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse>;
}

/// A transport shared between sessions.
pub type SharedTransport = Arc<dyn Transport>;

// ─────────────────────────────────────────────────────────────────────────────
// reqwest transport
// ─────────────────────────────────────────────────────────────────────────────

/// Transport backed by a `reqwest::Client`.
///
/// Cookies set by the service are kept in a store shared by every request
/// sent through this transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self> {
        Self::with_user_agent(format!("vetcompass-client/{}", env!("CARGO_PKG_VERSION")))
    }

    /// Create a transport with a custom user agent.
    pub fn with_user_agent(user_agent: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.into())
            .cookie_store(true)
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self { http })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        let body = if status.is_success() {
            response.bytes().await?
        } else {
            match response.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(status = status.as_u16(), error = %e, "failed to read error response body");
                    Bytes::new()
                }
            }
        };

        debug!(status = status.as_u16(), len = body.len(), "received response");
        Ok(TransportResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock transport
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted reply for [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond immediately.
    Respond(TransportResponse),
    /// Respond after a delay.
    Delayed(Duration, TransportResponse),
    /// Fail as if the server could not be reached.
    ConnectionFailed(String),
    /// Never respond.
    Pending,
}

impl MockReply {
    /// Shorthand for an immediate response.
    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        MockReply::Respond(TransportResponse::new(status, body))
    }
}

/// A transport that replays scripted replies and records every request.
///
/// Replies are consumed in order. Once the script runs out the fallback
/// reply, if any, is used; otherwise the call fails.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    fallback: Option<MockReply>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    /// Create a mock with the given replies.
    pub fn new(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `reply` whenever the script is exhausted.
    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<TransportResponse> {
        self.requests.lock().push(request);

        let reply = self.replies.lock().pop_front().or_else(|| self.fallback.clone());
        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(MockReply::ConnectionFailed(message)) => Err(Error::Transport(message)),
            Some(MockReply::Pending) => futures::future::pending().await,
            None => Err(Error::Transport(
                "MockTransport: no more replies available".to_string(),
            )),
        }
    }
}
