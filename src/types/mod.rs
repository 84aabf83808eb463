//! Core types for fhir-mcp.
//!
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the server, transport, and assessment

mod config;
mod errors;

pub use config::{
    AssessmentConfig, Config, FhirConfig, ObservabilityConfig, ServerConfig, CORE_CATEGORIES,
};
pub use errors::{rpc_codes, Error, Result};
