//! FHIR transport and the response-quality pipeline.
//!
//! ```text
//!   FhirClient ──► FhirResponse ──► classify ──► score ──► CategoryAssessment
//!                                      ▲                        │
//!                                      └──── assess (per category, isolated)
//! ```

pub mod assess;
pub mod classify;
pub mod client;
pub mod outcome;
pub mod score;

pub use assess::{assess, AssessmentReport, CategoryAssessment, CategoryAssessments};
pub use classify::{classify, classify_response, DataQuality, ValidationResult};
pub use client::{Endpoint, FhirClient, FhirTransport, QueryParams};
pub use outcome::{FhirResponse, OutcomeIssue};
pub use score::score;
