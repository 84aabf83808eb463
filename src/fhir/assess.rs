//! Data-quality assessment across resource categories.
//!
//! Each category is probed with one bounded search, classified and scored.
//! Every category yields a [`CategoryAssessment`] no matter what happens while
//! probing it, so one broken category never takes the report down with it.

use crate::fhir::classify::{classify_response, ValidationResult};
use crate::fhir::client::FhirTransport;
use crate::fhir::outcome::OutcomeIssue;
use crate::fhir::score::score;
use crate::types::{Error, Result};
use chrono::{DateTime, Utc};
use futures::{FutureExt, StreamExt};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Page size used when probing a category.
pub const ASSESSMENT_PAGE_SIZE: u32 = 10;

// =============================================================================
// Report types
// =============================================================================

/// One row of the assessment report.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CategoryAssessment {
    pub accessible: bool,
    pub total_available: u64,
    pub issues: Vec<OutcomeIssue>,
    pub data_quality_score: f64,
    /// Set only when the category could not be assessed at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryAssessment {
    pub fn from_validation(validation: &ValidationResult) -> Self {
        Self {
            accessible: validation.is_valid,
            total_available: validation.total_available(),
            issues: validation.issues.clone(),
            data_quality_score: score(validation),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            accessible: false,
            total_available: 0,
            issues: Vec::new(),
            data_quality_score: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Category name → assessment, iterated in the order categories were requested.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CategoryAssessments(Vec<(String, CategoryAssessment)>);

impl CategoryAssessments {
    pub fn get(&self, category: &str) -> Option<&CategoryAssessment> {
        self.0
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, assessment)| assessment)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CategoryAssessment)> {
        self.0.iter().map(|(name, a)| (name.as_str(), a))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CategoryAssessments {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, assessment) in &self.0 {
            map.serialize_entry(name, assessment)?;
        }
        map.end()
    }
}

/// Result of one assessment run. Built fresh per call.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AssessmentReport {
    pub server_url: String,
    pub timestamp: DateTime<Utc>,
    pub resource_assessments: CategoryAssessments,
}

// =============================================================================
// Category selection
// =============================================================================

/// Categories to scan: just `requested` when given, else `defaults`.
pub fn select_categories(requested: Option<&str>, defaults: &[String]) -> Vec<String> {
    match requested.map(str::trim).filter(|r| !r.is_empty()) {
        Some(category) => vec![category.to_string()],
        None => defaults.to_vec(),
    }
}

/// A category becomes a URL path segment, so it must be one plain token.
fn validate_category(category: &str) -> Result<()> {
    if category.is_empty() {
        return Err(Error::validation("resource category cannot be empty"));
    }
    if category
        .chars()
        .any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace())
    {
        return Err(Error::validation(format!(
            "invalid resource category '{category}'"
        )));
    }
    Ok(())
}

// =============================================================================
// Orchestration
// =============================================================================

/// Probe every category and assemble the report.
///
/// Up to `concurrency` categories are in flight at once; the report keeps the
/// requested order and drops repeated names.
pub async fn assess<T>(transport: &T, categories: &[String], concurrency: usize) -> AssessmentReport
where
    T: FhirTransport + ?Sized,
{
    let mut unique: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        if !unique.contains(category) {
            unique.push(category.clone());
        }
    }

    let rows: Vec<(String, CategoryAssessment)> = futures::stream::iter(unique)
        .map(|category: String| async move {
            let outcome = AssertUnwindSafe(assess_category(transport, category.as_str()))
                .catch_unwind()
                .await;
            let assessment = match outcome {
                Ok(Ok(assessment)) => assessment,
                Ok(Err(e)) => {
                    tracing::warn!(category = %category, "category assessment failed: {}", e);
                    CategoryAssessment::failed(e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(category = %category, "category assessment panicked: {}", message);
                    CategoryAssessment::failed(message)
                }
            };
            (category, assessment)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let report = AssessmentReport {
        server_url: transport.base_url().to_string(),
        timestamp: Utc::now(),
        resource_assessments: CategoryAssessments(rows),
    };
    tracing::info!(
        server_url = %report.server_url,
        categories = report.resource_assessments.len(),
        accessible = report.resource_assessments.iter().filter(|(_, a)| a.accessible).count(),
        "data quality assessment complete"
    );
    report
}

async fn assess_category<T>(transport: &T, category: &str) -> Result<CategoryAssessment>
where
    T: FhirTransport + ?Sized,
{
    validate_category(category)?;
    let query = vec![("_count".to_string(), ASSESSMENT_PAGE_SIZE.to_string())];
    let response = transport.get(category, &query).await;
    let validation = classify_response(&response);
    tracing::debug!(
        category,
        valid = validation.is_valid,
        total = validation.total_available(),
        "category classified"
    );
    Ok(CategoryAssessment::from_validation(&validation))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("unexpected failure: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("unexpected failure: {s}")
    } else {
        "unexpected failure".to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
