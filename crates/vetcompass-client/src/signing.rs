//! HMAC request signing.
//!
//! Every request carries three headers:
//!
//! - `vetcompass-request-date`: the ISO-8601 UTC time the request was made
//! - `vetcompass-clientid`: the caller's client id
//! - `vetcompass-hmac-authorisation`: `clientId:base64(HMAC-SHA256(secret, canonical))`
//!
//! The canonical string is
//! `method \n clientId \n contentLength \n contentType \n timestamp \n body`
//! and must match the server's byte for byte.

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::HttpRequest;

/// Header key for the request date.
pub const DATE_HEADER: &str = "vetcompass-request-date";

/// Header key for HMAC authorisation.
pub const HMAC_HEADER: &str = "vetcompass-hmac-authorisation";

/// Header key for the client id.
pub const CLIENT_ID_HEADER: &str = "vetcompass-clientid";

/// Content type of every POST body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

type HmacSha256 = Hmac<Sha256>;

/// Signs requests on behalf of one client.
#[derive(Clone)]
pub struct RequestSigner {
    client_id: Uuid,
    shared_secret: String,
}

impl RequestSigner {
    /// Create a signer for `client_id` using `shared_secret`.
    pub fn new(client_id: Uuid, shared_secret: impl Into<String>) -> Self {
        Self {
            client_id,
            shared_secret: shared_secret.into(),
        }
    }

    /// The client id requests are signed for.
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Build the string that gets hashed.
    pub fn canonical_string(
        &self,
        method: &str,
        content_length: usize,
        content_type: &str,
        timestamp: &str,
        body: &str,
    ) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            self.client_id.hyphenated(),
            content_length,
            content_type,
            timestamp,
            body
        )
    }

    /// HMAC-SHA256 the canonical string and base64 encode it.
    pub fn signature(&self, canonical: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.shared_secret.as_bytes())
            .map_err(|e| Error::Config(format!("invalid shared secret: {}", e)))?;
        mac.update(canonical.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Sign `request` with the current time.
    pub fn sign(&self, request: &mut HttpRequest) -> Result<()> {
        self.sign_at(request, Utc::now())
    }

    /// Sign `request` as if it were made at `at`.
    ///
    /// Sets the content type (POST) or accept (GET) header, then the date,
    /// client id and authorisation headers.
    pub fn sign_at(&self, request: &mut HttpRequest, at: DateTime<Utc>) -> Result<()> {
        let timestamp = format_timestamp(at);
        let content_type = if request.body.is_some() {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            JSON_CONTENT_TYPE
        } else {
            request
                .headers
                .insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
            ""
        };

        let body = request
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        let canonical = self.canonical_string(
            request.method.as_str(),
            request.content_length(),
            content_type,
            &timestamp,
            &body,
        );
        let signature = self.signature(&canonical)?;

        let client_id = self.client_id.hyphenated().to_string();
        insert(request, DATE_HEADER, &timestamp)?;
        insert(request, CLIENT_ID_HEADER, &client_id)?;
        insert(request, HMAC_HEADER, &format!("{}:{}", client_id, signature))?;
        Ok(())
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("client_id", &self.client_id)
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

/// ISO-8601 UTC with seven fractional digits, e.g. `2015-06-01T12:30:45.1234567Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    // Leap seconds report nanos above 1e9.
    let ticks = (at.timestamp_subsec_nanos() / 100).min(9_999_999);
    format!("{}.{:07}Z", at.format("%Y-%m-%dT%H:%M:%S"), ticks)
}

fn insert(request: &mut HttpRequest, name: &'static str, value: &str) -> Result<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|_| Error::Config(format!("invalid value for header {}", name)))?;
    request
        .headers
        .insert(HeaderName::from_static(name), value);
    Ok(())
}
