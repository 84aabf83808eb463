//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation and provide
//! clear error messages with context. Expected FHIR failure modes never show up
//! here: the transport turns them into OperationOutcome data instead.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// JSON-RPC 2.0 error codes used by the MCP server.
pub mod rpc_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Main error enum for fhir-mcp.
#[derive(Error, Debug)]
pub enum Error {
    /// Validation errors (map to JSON-RPC INVALID_PARAMS).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown tool or method target (map to JSON-RPC INVALID_PARAMS).
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// Internal errors (map to JSON-RPC INTERNAL_ERROR).
    #[error("internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client construction errors.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert to a JSON-RPC error code.
    pub fn rpc_code(&self) -> i64 {
        match self {
            Error::Validation(_) | Error::NotFound(_) => rpc_codes::INVALID_PARAMS,
            Error::Config(_)
            | Error::Internal(_)
            | Error::Serialization(_)
            | Error::Http(_)
            | Error::Io(_) => rpc_codes::INTERNAL_ERROR,
        }
    }
}

// Convenience constructors
impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
