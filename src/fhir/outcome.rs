//! OperationOutcome issues and the transport result type.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// FHIR media type used for both `Accept` and `Content-Type`.
pub const FHIR_JSON: &str = "application/fhir+json";

/// `resourceType` label of the server's structured error object.
pub const OPERATION_OUTCOME: &str = "OperationOutcome";

/// `resourceType` label of a paginated search result.
pub const BUNDLE: &str = "Bundle";

/// Issue codes synthesized by the transport.
pub mod codes {
    pub const NOT_FOUND: &str = "not-found";
    pub const SECURITY: &str = "security";
    pub const FORBIDDEN: &str = "forbidden";
    pub const INVALID: &str = "invalid";
    pub const TIMEOUT: &str = "timeout";
    pub const EXCEPTION: &str = "exception";
}

/// One normalized problem record.
///
/// Severity and code are open strings: upstream servers are free to report
/// values outside the FHIR value sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeIssue {
    pub severity: String,
    pub code: String,
    pub details: String,
}

impl OutcomeIssue {
    pub fn new(
        severity: impl Into<String>,
        code: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            severity: severity.into(),
            code: code.into(),
            details: details.into(),
        }
    }

    /// Error-severity issue, the only kind the transport synthesizes.
    pub fn error(code: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new("error", code, details)
    }

    /// FHIR wire shape of this issue (`details` nested under `text`).
    pub fn to_fhir(&self) -> Value {
        json!({
            "severity": self.severity,
            "code": self.code,
            "details": { "text": self.details },
        })
    }

    /// Single-issue OperationOutcome resource.
    pub fn to_operation_outcome(&self) -> Value {
        json!({
            "resourceType": OPERATION_OUTCOME,
            "issue": [self.to_fhir()],
        })
    }
}

/// Result of one transport exchange.
///
/// Failure is data: every local failure mode becomes a `Failure` so callers
/// never branch on errors for expected FHIR outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum FhirResponse {
    /// Decoded body of a successful exchange, verbatim.
    Success(Value),
    /// Locally synthesized problem.
    Failure(OutcomeIssue),
}

impl FhirResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, FhirResponse::Success(_))
    }

    /// Collapse to the JSON shape returned to tool callers.
    pub fn into_json(self) -> Value {
        match self {
            FhirResponse::Success(body) => body,
            FhirResponse::Failure(issue) => issue.to_operation_outcome(),
        }
    }
}
