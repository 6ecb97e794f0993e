//! Signed calls to the coding service.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::async_result::AsyncResult;
use crate::error::{Error, Result};
use crate::signing::RequestSigner;
use crate::transport::{HttpRequest, SharedTransport, TransportResponse};
use crate::types::{CodingSubject, Query, QueryResponse, Selection};

/// Everything a session needs to talk to the service.
///
/// Cheap to clone; every session created by one factory shares the same
/// transport (and so the same cookie store).
#[derive(Clone)]
pub(crate) struct ServiceClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    signer: RequestSigner,
    transport: SharedTransport,
    /// Base URL of the session resource, always ending in `/`.
    base_url: Url,
    /// Runtime that eager work (session creation, blocking queries) runs on.
    runtime: Handle,
}

impl ServiceClient {
    pub(crate) fn new(
        signer: RequestSigner,
        transport: SharedTransport,
        base_url: Url,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                signer,
                transport,
                base_url,
                runtime,
            }),
        }
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// `<base>/<session id>/`
    pub(crate) fn session_url(&self, session_id: Uuid) -> Result<Url> {
        Ok(self
            .inner
            .base_url
            .join(&format!("{}/", session_id.hyphenated()))?)
    }

    /// Signed POST that creates the session on the service.
    pub(crate) fn creation_request(
        &self,
        session_url: &Url,
        subject: &CodingSubject,
    ) -> Result<HttpRequest> {
        let body = serde_json::to_vec(subject)?;
        let mut request = HttpRequest::post(session_url.clone(), body);
        self.inner.signer.sign(&mut request)?;
        Ok(request)
    }

    /// Signed GET `<session>/search/<expression>?skip=&take=&filterSubset=`.
    pub(crate) fn search_request(&self, session_url: &Url, query: &Query) -> Result<HttpRequest> {
        let mut url = session_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("cannot-be-a-base URL: {}", session_url)))?
            .pop_if_empty()
            .push("search")
            .push(query.search_expression());

        {
            let mut pairs = url.query_pairs_mut();
            if let Some(skip) = query.skip {
                pairs.append_pair("skip", &skip.to_string());
            }
            if let Some(take) = query.take {
                pairs.append_pair("take", &take.to_string());
            }
            if let Some(subsets) = query.filter_subset.as_ref().filter(|s| !s.is_empty()) {
                let joined = subsets
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                pairs.append_pair("filterSubset", &joined);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let mut request = HttpRequest::get(url);
        self.inner.signer.sign(&mut request)?;
        Ok(request)
    }

    /// Signed POST `<session>/selection`.
    pub(crate) fn selection_request(
        &self,
        session_url: &Url,
        selection: &Selection,
    ) -> Result<HttpRequest> {
        let body = serde_json::to_vec(selection)?;
        let mut request = HttpRequest::post(session_url.join("selection")?, body);
        self.inner.signer.sign(&mut request)?;
        Ok(request)
    }

    /// Send a request; a non-2xx status fails the result with the body kept.
    pub(crate) fn send(&self, request: HttpRequest) -> AsyncResult<TransportResponse> {
        let transport = Arc::clone(&self.inner.transport);
        AsyncResult::from_result(async move {
            debug!(method = %request.method, url = %request.url, "dispatching");
            transport.send(request).await?.ensure_success()
        })
    }

    /// Run a search and decode the response.
    pub(crate) fn search(&self, session_url: &Url, query: &Query) -> AsyncResult<QueryResponse> {
        match self.search_request(session_url, query) {
            Ok(request) => self
                .send(request)
                .try_map_success(|response| response.json::<QueryResponse>()),
            Err(e) => AsyncResult::failed(e),
        }
    }

    /// Post a selection.
    pub(crate) fn post_selection(
        &self,
        session_url: &Url,
        selection: &Selection,
    ) -> AsyncResult<TransportResponse> {
        match self.selection_request(session_url, selection) {
            Ok(request) => self.send(request),
            Err(e) => AsyncResult::failed(e),
        }
    }
}

impl std::fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("signer", &self.inner.signer)
            .finish_non_exhaustive()
    }
}
