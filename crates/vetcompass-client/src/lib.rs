//! Client for the VetCompass clinical coding service.
//!
//! A [`CodingSessionFactory`] holds the credentials and transport; each
//! [`CodingSession`] searches VeNom codes for one patient and records the
//! code the user finally picked.
//!
//! # Example
//!
//! ```no_run
//! use uuid::Uuid;
//! use vetcompass_client::{CodingSessionFactory, CodingSubject, Outcome, Query, Selection};
//!
//! # async fn example() -> vetcompass_client::Result<()> {
//! let factory = CodingSessionFactory::builder()
//!     .client_id(Uuid::new_v4())
//!     .shared_secret("not very secret")
//!     .base_url("http://localhost:5000/api/1.0/session/")
//!     .build()?;
//!
//! // Queries can be issued straight away; they wait for the session
//! // to be created on the service.
//! let session = factory.start_coding_session(CodingSubject::new("case-1234"), None)?;
//!
//! match session.query_async(Query::new("rta")?)?.await {
//!     Outcome::Success(response) => {
//!         if let Some(code) = response.results.first() {
//!             session
//!                 .register_selection(Selection::new("rta", code.venom_id)?)?
//!                 .await
//!                 .into_result()?;
//!         }
//!     }
//!     Outcome::Cancelled(reason) => eprintln!("query cancelled: {reason}"),
//!     Outcome::Failed(failure) => eprintln!("query failed: {failure}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Outcomes
//!
//! Every asynchronous operation resolves to an [`Outcome`]: success,
//! cancellation (a timeout or [`CodingSession::cancel`]) or failure. A
//! cancellation is never reported as a failure.

pub mod async_result;
mod client;
pub mod error;
pub mod factory;
pub mod outcome;
pub mod session;
pub mod signing;
pub mod timeout;
pub mod transport;
pub mod types;

pub use async_result::{AsyncResult, SharedResult};
pub use error::{Error, Result};
pub use factory::{CodingSessionFactory, DEFAULT_BASE_URL, FactoryBuilder};
pub use outcome::{CancelReason, Failure, Outcome};
pub use session::{CodingSession, Fault, SessionState};
pub use signing::RequestSigner;
pub use transport::{
    HttpRequest, HttpTransport, MockReply, MockTransport, SharedTransport, Transport,
    TransportResponse,
};
pub use types::*;
