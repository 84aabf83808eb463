//! # fhir-mcp - FHIR tools over the Model Context Protocol
//!
//! Read-only FHIR REST operations exposed as MCP tools, plus a lightweight
//! data-quality assessment:
//! - Transport that turns every HTTP failure into an OperationOutcome
//! - Classification of responses into bundles, resources and outcomes
//! - Deterministic 0–100 quality scoring
//! - Per-category assessment with failure isolation
//! - Newline-delimited JSON-RPC server on stdio
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────────────────┐
//!   MCP (stdio)  →   │  McpServer → router → FhirTools     │
//!                    │                          │          │
//!                    │            ┌─────────────┴───────┐  │
//!                    │            │ FhirClient (reqwest)│  │
//!                    │            └─────────────┬───────┘  │
//!                    │   classify → score → assess         │
//!                    └─────────────────────────────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod fhir;
pub mod mcp;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};
