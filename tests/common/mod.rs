//! In-process mock FHIR server for integration tests.
//!
//! Routes (all under `/fhir`):
//! - `Patient/1` → Patient resource, `Patient/<other>` → 404
//! - `Patient` → Bundle (total 3, next link), `Empty` → Bundle (total 0)
//! - `Condition` → Bundle with subject references
//! - `Observation` → 401, `MedicationRequest` → 403, `DiagnosticReport` → 500
//! - `CarePlan` → 200 with a non-JSON body
//! - `Outcome` → 200 OperationOutcome
//! - `Slow` → sleeps 2s
//! - `metadata` → CapabilityStatement

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One request as seen by the mock.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone, Default)]
pub struct MockState {
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockState {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests().pop().expect("no request recorded")
    }
}

pub struct MockFhir {
    pub addr: SocketAddr,
    pub state: MockState,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockFhir {
    /// Base URL of the mock, e.g. `http://127.0.0.1:1234/fhir`.
    pub fn base_url(&self) -> String {
        format!("http://{}/fhir", self.addr)
    }
}

pub async fn start_mock_fhir() -> MockFhir {
    let state = MockState::default();
    let router = Router::new().fallback(handle).with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    MockFhir {
        addr,
        state,
        _handle: handle,
    }
}

/// An address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/fhir", addr)
}

fn fhir_json(status: StatusCode, body: Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/fhir+json")],
        body.to_string(),
    )
        .into_response()
}

pub fn patient_bundle() -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "searchset",
        "total": 3,
        "entry": [
            {"resource": {"resourceType": "Patient", "id": "1"}},
            {"resource": {"resourceType": "Patient", "id": "2"}},
        ],
        "link": [{"relation": "next", "url": "http://mock/fhir/Patient?page=2"}],
    })
}

pub fn condition_bundle() -> Value {
    json!({
        "resourceType": "Bundle",
        "total": 4,
        "entry": [
            {"resource": {"resourceType": "Condition", "subject": {"reference": "Patient/1"}}},
            {"resource": {"resourceType": "Condition", "subject": {"reference": "Patient/2"}}},
            {"resource": {"resourceType": "Condition", "subject": {"reference": "Patient/1"}}},
            {"resource": {"resourceType": "Condition", "subject": {"reference": "Group/7"}}},
        ],
    })
}

async fn handle(State(state): State<MockState>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().trim_start_matches("/fhir/").to_string();
    state.requests.lock().unwrap().push(Recorded {
        path: path.clone(),
        query: uri.query().map(str::to_string),
        headers,
    });

    match path.as_str() {
        "Patient/1" => fhir_json(
            StatusCode::OK,
            json!({"resourceType": "Patient", "id": "1", "name": [{"family": "Chalmers"}]}),
        ),
        p if p.starts_with("Patient/") => StatusCode::NOT_FOUND.into_response(),
        "Patient" => fhir_json(StatusCode::OK, patient_bundle()),
        "Empty" => fhir_json(
            StatusCode::OK,
            json!({"resourceType": "Bundle", "total": 0, "entry": [], "link": []}),
        ),
        "Condition" => fhir_json(StatusCode::OK, condition_bundle()),
        "Observation" => StatusCode::UNAUTHORIZED.into_response(),
        "MedicationRequest" => StatusCode::FORBIDDEN.into_response(),
        "DiagnosticReport" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "CarePlan" => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        "Outcome" => fhir_json(
            StatusCode::OK,
            json!({
                "resourceType": "OperationOutcome",
                "issue": [{"severity": "error", "code": "not-found", "details": {"text": "x"}}],
            }),
        ),
        "Slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            fhir_json(StatusCode::OK, json!({"resourceType": "Bundle", "total": 1}))
        }
        "metadata" => fhir_json(
            StatusCode::OK,
            json!({"resourceType": "CapabilityStatement", "fhirVersion": "4.0.1"}),
        ),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
