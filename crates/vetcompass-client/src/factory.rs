//! Session factory.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use url::Url;
use uuid::Uuid;

use crate::client::ServiceClient;
use crate::error::{Error, Result};
use crate::session::CodingSession;
use crate::signing::RequestSigner;
use crate::transport::{HttpTransport, SharedTransport};
use crate::types::CodingSubject;

/// Default session resource of the public service.
pub const DEFAULT_BASE_URL: &str = "https://vetcompass.herokuapp.com/api/1.0/session/";

/// Creates coding sessions against one service with one set of credentials.
///
/// Cheap to clone. Sessions created by the same factory share a transport,
/// so a single factory per process is usually enough.
///
/// # Example
///
/// ```no_run
/// use uuid::Uuid;
/// use vetcompass_client::{CodingSessionFactory, CodingSubject, Query};
///
/// # async fn example() -> vetcompass_client::Result<()> {
/// let factory = CodingSessionFactory::builder()
///     .client_id(Uuid::new_v4())
///     .shared_secret("not very secret")
///     .build()?;
///
/// let session = factory.start_coding_session(CodingSubject::new("case-1"), None)?;
/// let response = session.query_async(Query::new("rta")?)?.await.into_result()?;
/// for code in response.results {
///     println!("{} {}", code.venom_id, code.name);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CodingSessionFactory {
    client: ServiceClient,
    timeout: Option<Duration>,
}

impl CodingSessionFactory {
    /// Create a new factory builder.
    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    /// Get the base URL sessions are created under.
    pub fn base_url(&self) -> &Url {
        self.client.base_url()
    }

    /// Default timeout for sessions that don't set their own.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Create a session without starting it.
    pub fn create_session(
        &self,
        subject: CodingSubject,
        timeout: Option<Duration>,
    ) -> CodingSession {
        CodingSession::new(self.client.clone(), subject, timeout.or(self.timeout))
    }

    /// Create a session and start it on the service.
    ///
    /// `timeout` overrides the factory default for this session.
    pub fn start_coding_session(
        &self,
        subject: CodingSubject,
        timeout: Option<Duration>,
    ) -> Result<CodingSession> {
        let session = self.create_session(subject, timeout);
        session.start()?;
        Ok(session)
    }

    /// Attach to an existing session without contacting the service.
    pub fn resume_coding_session(
        &self,
        subject: CodingSubject,
        session_id: Uuid,
        timeout: Option<Duration>,
    ) -> Result<CodingSession> {
        let session = self.create_session(subject, timeout);
        session.resume(session_id)?;
        Ok(session)
    }
}

/// Builder for creating a [`CodingSessionFactory`].
pub struct FactoryBuilder {
    client_id: Option<Uuid>,
    shared_secret: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    transport: Option<SharedTransport>,
    runtime: Option<Handle>,
    user_agent: Option<String>,
}

impl FactoryBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            client_id: None,
            shared_secret: None,
            base_url: None,
            timeout: None,
            transport: None,
            runtime: None,
            user_agent: None,
        }
    }

    /// Set the client id issued by the service.
    pub fn client_id(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Set the shared secret used to sign requests.
    pub fn shared_secret(mut self, secret: impl Into<String>) -> Self {
        self.shared_secret = Some(secret.into());
        self
    }

    /// Set the session resource URL. Defaults to [`DEFAULT_BASE_URL`].
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the default timeout for every network operation of a session.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a custom transport instead of [`HttpTransport`].
    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Run session work on `handle` instead of the current runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Set a custom user agent for the default transport.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the factory.
    pub fn build(self) -> Result<CodingSessionFactory> {
        let client_id = self
            .client_id
            .ok_or_else(|| Error::Config("client_id is required".to_string()))?;
        let shared_secret = self
            .shared_secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("shared_secret is required".to_string()))?;

        // Parse and normalize base URL
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| {
                Error::Config("no tokio runtime available; set one with runtime()".to_string())
            })?,
        };

        let transport: SharedTransport = match self.transport {
            Some(transport) => transport,
            None => match self.user_agent {
                Some(agent) => Arc::new(HttpTransport::with_user_agent(agent)?),
                None => Arc::new(HttpTransport::new()?),
            },
        };

        Ok(CodingSessionFactory {
            client: ServiceClient::new(
                RequestSigner::new(client_id, shared_secret),
                transport,
                base_url,
                runtime,
            ),
            timeout: self.timeout,
        })
    }
}

impl Default for FactoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FactoryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryBuilder")
            .field("client_id", &self.client_id)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
