//! Tool infrastructure — catalog metadata and the FHIR operation facade.

pub mod catalog;
pub mod operations;

pub use catalog::{ParamDef, ParamType, ToolCatalog, ToolEntry};
pub use operations::{default_catalog, patient_ids_from_conditions, FhirTools, Operation};
