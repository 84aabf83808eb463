//! Response classification.
//!
//! Every accessor here defaults instead of failing: the payload comes from a
//! server we do not control and may be missing keys or carry the wrong types.

use crate::fhir::outcome::{FhirResponse, OutcomeIssue, BUNDLE, OPERATION_OUTCOME};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// Facts extracted from a search Bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    /// Declared `total` (0 when absent or not a non-negative integer).
    pub total_resources: u64,
    /// Number of entries actually returned on this page.
    pub returned_resources: usize,
    pub has_next_page: bool,
    /// Distinct `resourceType` labels of embedded resources.
    pub resource_types: BTreeSet<String>,
}

/// Classification of one response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<OutcomeIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,
    pub resource_type: String,
}

impl ValidationResult {
    /// Result for an OperationOutcome carrying `issues`.
    pub fn invalid(issues: Vec<OutcomeIssue>) -> Self {
        Self {
            is_valid: false,
            issues,
            data_quality: None,
            resource_type: OPERATION_OUTCOME.to_string(),
        }
    }

    /// Declared total, or 0 when this was not a bundle.
    pub fn total_available(&self) -> u64 {
        self.data_quality
            .as_ref()
            .map(|dq| dq.total_resources)
            .unwrap_or(0)
    }
}

// =============================================================================
// Accessors
// =============================================================================

fn str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn array_of<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Declared `resourceType`, if it is a string.
pub fn resource_type_of(value: &Value) -> Option<&str> {
    value.get("resourceType").and_then(Value::as_str)
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a decoded FHIR response.
pub fn classify(response: &Value) -> ValidationResult {
    match resource_type_of(response) {
        Some(OPERATION_OUTCOME) => ValidationResult::invalid(outcome_issues(response)),
        Some(BUNDLE) => ValidationResult {
            is_valid: true,
            issues: Vec::new(),
            data_quality: Some(bundle_facts(response)),
            resource_type: BUNDLE.to_string(),
        },
        other => ValidationResult {
            is_valid: true,
            issues: Vec::new(),
            data_quality: None,
            resource_type: other.unwrap_or("Unknown").to_string(),
        },
    }
}

/// Classify a transport result. A local failure classifies exactly like the
/// OperationOutcome it would collapse to.
pub fn classify_response(response: &FhirResponse) -> ValidationResult {
    match response {
        FhirResponse::Success(body) => classify(body),
        FhirResponse::Failure(issue) => ValidationResult::invalid(vec![issue.clone()]),
    }
}

fn outcome_issues(outcome: &Value) -> Vec<OutcomeIssue> {
    array_of(outcome, "issue")
        .iter()
        .map(|issue| {
            let details = issue
                .get("details")
                .and_then(|d| d.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("No details");
            OutcomeIssue::new(
                str_or(issue, "severity", "unknown"),
                str_or(issue, "code", "unknown"),
                details,
            )
        })
        .collect()
}

fn bundle_facts(bundle: &Value) -> DataQuality {
    let entries = array_of(bundle, "entry");

    let has_next_page = array_of(bundle, "link")
        .iter()
        .any(|link| link.get("relation").and_then(Value::as_str) == Some("next"));

    let resource_types = entries
        .iter()
        .filter_map(|entry| entry.get("resource"))
        .filter_map(resource_type_of)
        .map(str::to_string)
        .collect();

    DataQuality {
        total_resources: bundle.get("total").and_then(Value::as_u64).unwrap_or(0),
        returned_resources: entries.len(),
        has_next_page,
        resource_types,
    }
}

// =============================================================================
// Tests
// =============================================================================
