//! Data-quality scoring.

use crate::fhir::classify::ValidationResult;

/// Score of a perfectly healthy category.
pub const MAX_SCORE: f64 = 100.0;

const ERROR_PENALTY: f64 = 30.0;
const WARNING_PENALTY: f64 = 10.0;
const EMPTY_BUNDLE_PENALTY: f64 = 50.0;

/// Convert a classification into a score in `[0, 100]`.
///
/// Invalid responses score 0. Otherwise each `error` issue costs 30, each
/// `warning` 10, and a bundle declaring zero total costs a further 50.
pub fn score(validation: &ValidationResult) -> f64 {
    if !validation.is_valid {
        return 0.0;
    }

    let issue_penalty: f64 = validation
        .issues
        .iter()
        .map(|issue| match issue.severity.as_str() {
            "error" => ERROR_PENALTY,
            "warning" => WARNING_PENALTY,
            _ => 0.0,
        })
        .sum();

    let empty_penalty = match &validation.data_quality {
        Some(dq) if dq.total_resources == 0 => EMPTY_BUNDLE_PENALTY,
        _ => 0.0,
    };

    (MAX_SCORE - issue_penalty - empty_penalty).max(0.0)
}
