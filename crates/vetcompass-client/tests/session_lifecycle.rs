//! Session lifecycle tests against a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;
use vetcompass_client::{
    CancelReason, CodingSession, CodingSessionFactory, CodingSubject, Error, MockReply,
    MockTransport, Query, Selection, SessionState, TransportResponse,
};

const BASE_URL: &str = "http://localhost:5000/api/1.0/session/";

fn factory(mock: &Arc<MockTransport>) -> CodingSessionFactory {
    CodingSessionFactory::builder()
        .client_id(Uuid::parse_str("6219abd9-b229-458c-baa0-2fc80763193e").unwrap())
        .shared_secret("not very secret")
        .base_url(BASE_URL)
        .transport(mock.clone())
        .build()
        .unwrap()
}

fn search_body(expression: &str) -> String {
    json!({
        "Query": {"SearchExpression": expression},
        "Results": [
            {"VeNomId": 1234, "Name": "Road traffic accident", "Subset": "Diagnosis"},
            {"VeNomId": 5678, "Name": "Trauma", "Subset": "Diagnosis"}
        ]
    })
    .to_string()
}

fn start(mock: &Arc<MockTransport>, timeout: Option<Duration>) -> CodingSession {
    factory(mock)
        .start_coding_session(CodingSubject::new("case-1234"), timeout)
        .unwrap()
}

#[tokio::test]
async fn test_start_then_query() {
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(200, search_body("rta")),
    ]));
    let session = start(&mock, None);

    let response = session
        .query_async(Query::new("rta").unwrap())
        .unwrap()
        .await
        .into_result()
        .unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].venom_id, 1234);
    assert_eq!(session.state(), SessionState::Ready);

    let requests = mock.requests();
    let session_id = session.session_id().unwrap();
    assert_eq!(requests[0].method, reqwest::Method::POST);
    assert_eq!(requests[0].url.as_str(), format!("{BASE_URL}{session_id}/"));
    assert_eq!(
        requests[0].body.as_deref(),
        Some(br#"{"CaseNumber":"case-1234"}"#.as_slice())
    );
    assert_eq!(requests[1].method, reqwest::Method::GET);
    assert_eq!(
        requests[1].url.as_str(),
        format!("{BASE_URL}{session_id}/search/rta")
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_timeout_cancels_gate_and_queries() {
    let mock = Arc::new(MockTransport::new([MockReply::Pending]));
    let session = start(&mock, Some(Duration::from_millis(50)));

    let query = session.query_async(Query::new("rta").unwrap()).unwrap();

    let gate = session.ready().unwrap().await;
    assert_eq!(
        gate.cancel_reason(),
        Some(&CancelReason::Timeout {
            after: Duration::from_millis(50)
        })
    );
    assert!(query.await.is_cancelled());
    assert_eq!(session.state(), SessionState::Cancelled);
    assert!(session.fault().is_none());

    let later = session
        .query_async(Query::new("vomiting").unwrap())
        .unwrap()
        .await;
    assert!(later.is_cancelled());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_creation_failure_faults_session() {
    let mock = Arc::new(MockTransport::new([MockReply::status(
        500,
        r#"{"error":"bad subject"}"#,
    )]));
    let session = start(&mock, None);

    let gate = session.ready().unwrap().await;
    assert!(gate.is_failed());
    assert!(session.is_faulted());
    assert_eq!(
        session.server_error_message().as_deref(),
        Some(r#"{"error":"bad subject"}"#)
    );

    let fault = session.fault().unwrap();
    assert!(matches!(
        fault.failure.root_cause(),
        Error::Status { status: 500, .. }
    ));

    assert!(matches!(
        session.query_async(Query::new("rta").unwrap()),
        Err(Error::SessionFaulted)
    ));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_connection_failure_faults_without_message() {
    let mock = Arc::new(MockTransport::new([MockReply::ConnectionFailed(
        "connection refused".into(),
    )]));
    let session = start(&mock, None);

    assert!(session.ready().unwrap().await.is_failed());
    assert!(session.is_faulted());
    assert!(session.server_error_message().is_none());
}

#[tokio::test]
async fn test_blank_query_is_rejected_before_transport() {
    let mock = Arc::new(MockTransport::new([MockReply::status(201, "")]));
    let session = start(&mock, None);
    session.ready().unwrap().await;

    assert!(matches!(Query::new(""), Err(Error::Validation(_))));
    assert!(matches!(Query::new("  "), Err(Error::Validation(_))));
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_resume_skips_creation() {
    let mock = Arc::new(MockTransport::new([MockReply::status(200, search_body("rta"))]));
    let session_id = Uuid::new_v4();
    let session = factory(&mock)
        .resume_coding_session(CodingSubject::new("case-1234"), session_id, None)
        .unwrap();

    assert_eq!(mock.call_count(), 0);
    assert_eq!(session.state(), SessionState::Ready);

    let outcome = session.query_async(Query::new("rta").unwrap()).unwrap().await;
    assert!(outcome.is_success());

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].url.as_str(),
        format!("{BASE_URL}{session_id}/search/rta")
    );
}

#[tokio::test]
async fn test_queries_wait_for_gate() {
    let mock = Arc::new(
        MockTransport::new([MockReply::Delayed(
            Duration::from_millis(20),
            TransportResponse::new(201, ""),
        )])
        .with_fallback(MockReply::status(200, search_body("rta"))),
    );
    let session = start(&mock, None);

    let queries: Vec<_> = ["rta", "vomiting", "lame"]
        .into_iter()
        .map(|e| session.query_async(Query::new(e).unwrap()).unwrap())
        .collect();
    let outcomes = futures::future::join_all(queries).await;

    assert!(outcomes.iter().all(|o| o.is_success()));
    let requests = mock.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].method, reqwest::Method::POST);
    assert!(
        requests[1..]
            .iter()
            .all(|r| r.method == reqwest::Method::GET)
    );
}

#[tokio::test]
async fn test_query_failure_does_not_fault() {
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(404, "no such session"),
        MockReply::status(200, search_body("rta")),
    ]));
    let session = start(&mock, None);

    let failed = session.query_async(Query::new("rta").unwrap()).unwrap().await;
    assert!(failed.is_failed());
    assert!(!session.is_faulted());

    let retried = session.query_async(Query::new("rta").unwrap()).unwrap().await;
    assert!(retried.is_success());
}

#[tokio::test]
async fn test_malformed_search_response_fails_query() {
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(200, "not json"),
    ]));
    let session = start(&mock, None);

    let outcome = session.query_async(Query::new("rta").unwrap()).unwrap().await;
    assert!(matches!(
        outcome.failure().unwrap().root_cause(),
        Error::Json(_)
    ));
}

#[tokio::test]
async fn test_selection_posts_and_succeeds() {
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(200, ""),
    ]));
    let session = start(&mock, None);

    let outcome = session
        .register_selection(Selection::new("rta", 1234).unwrap())
        .unwrap()
        .await;
    assert!(outcome.is_success());

    let requests = mock.requests();
    let session_id = session.session_id().unwrap();
    assert_eq!(
        requests[1].url.as_str(),
        format!("{BASE_URL}{session_id}/selection")
    );
    assert_eq!(
        requests[1].body.as_deref(),
        Some(br#"{"SearchExpression":"rta","VeNomId":1234}"#.as_slice())
    );
}

#[tokio::test]
async fn test_selection_failure_faults_and_blocks_further_work() {
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(400, "unknown VeNom id"),
    ]));
    let session = start(&mock, None);

    let outcome = session
        .register_selection(Selection::new("rta", 1).unwrap())
        .unwrap()
        .await;
    assert!(outcome.is_failed());
    assert!(session.is_faulted());
    assert_eq!(
        session.server_error_message().as_deref(),
        Some("unknown VeNom id")
    );

    let calls = mock.call_count();
    assert!(matches!(
        session.register_selection(Selection::new("rta", 2).unwrap()),
        Err(Error::SessionFaulted)
    ));
    assert!(matches!(
        session.query_async(Query::new("rta").unwrap()),
        Err(Error::SessionFaulted)
    ));
    assert_eq!(mock.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_first_fault_is_kept() {
    let mock = Arc::new(MockTransport::new([
        MockReply::Delayed(
            Duration::from_millis(10),
            TransportResponse::new(500, "first"),
        ),
        MockReply::Delayed(
            Duration::from_millis(50),
            TransportResponse::new(500, "second"),
        ),
    ]));
    let session = factory(&mock)
        .resume_coding_session(CodingSubject::default(), Uuid::new_v4(), None)
        .unwrap();

    let a = session
        .register_selection(Selection::new("rta", 1).unwrap())
        .unwrap();
    let b = session
        .register_selection(Selection::new("rta", 2).unwrap())
        .unwrap();
    let (a, b) = tokio::join!(a, b);

    assert!(a.is_failed());
    assert!(b.is_failed());
    assert_eq!(session.server_error_message().as_deref(), Some("first"));
}

#[tokio::test]
async fn test_cancel_resolves_pending_query() {
    let mock = Arc::new(
        MockTransport::new([MockReply::status(201, "")]).with_fallback(MockReply::Pending),
    );
    let session = start(&mock, None);
    session.ready().unwrap().await;

    let query = session.query_async(Query::new("rta").unwrap()).unwrap();
    let handle = tokio::spawn(query);
    tokio::task::yield_now().await;

    session.cancel();
    let outcome = handle.await.unwrap();
    assert_eq!(outcome.cancel_reason(), Some(&CancelReason::Requested));
    assert_eq!(session.state(), SessionState::Ready);
    assert!(!session.is_faulted());
}

#[tokio::test(start_paused = true)]
async fn test_query_timeout() {
    let mock = Arc::new(
        MockTransport::new([MockReply::status(201, "")]).with_fallback(MockReply::Pending),
    );
    let session = start(&mock, Some(Duration::from_millis(100)));
    session.ready().unwrap().await;

    let outcome = session.query_async(Query::new("rta").unwrap()).unwrap().await;
    assert!(outcome.is_cancelled());
    assert!(!session.is_faulted());
}

#[tokio::test]
async fn test_requests_are_signed() {
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(200, search_body("rta")),
    ]));
    let session = start(&mock, None);
    session
        .query_async(Query::new("rta").unwrap())
        .unwrap()
        .await;

    for request in mock.requests() {
        assert_eq!(
            request.header("vetcompass-clientid"),
            Some("6219abd9-b229-458c-baa0-2fc80763193e")
        );
        assert!(request.header("vetcompass-request-date").is_some());
        assert!(
            request
                .header("vetcompass-hmac-authorisation")
                .unwrap()
                .starts_with("6219abd9-b229-458c-baa0-2fc80763193e:")
        );
    }
}

#[test]
fn test_query_sync_outside_runtime() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(200, search_body("rta")),
    ]));
    let factory = CodingSessionFactory::builder()
        .client_id(Uuid::new_v4())
        .shared_secret("not very secret")
        .base_url(BASE_URL)
        .transport(mock.clone())
        .runtime(runtime.handle().clone())
        .build()
        .unwrap();

    let session = factory
        .start_coding_session(CodingSubject::new("case-1234"), None)
        .unwrap();
    let response = session.query_sync(Query::new("rta").unwrap()).unwrap();

    assert_eq!(response.query.search_expression(), "rta");
    assert_eq!(mock.call_count(), 2);
}

#[test]
fn test_query_sync_inside_runtime_is_rejected() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mock = Arc::new(MockTransport::new([
        MockReply::status(201, ""),
        MockReply::status(200, search_body("rta")),
    ]));

    let (result, ready) = runtime.block_on(async {
        let session = start(&mock, None);
        let result = session.query_sync(Query::new("rta").unwrap());
        (result, session.ready().unwrap().await)
    });

    assert!(matches!(result, Err(Error::BlockingInRuntime)));
    assert!(ready.is_success());
    assert_eq!(mock.call_count(), 1);
}
