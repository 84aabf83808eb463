//! Configuration structures.
//!
//! Configuration is loaded from an optional JSON file, then overridden from
//! environment variables.

use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Categories scanned by a data-quality assessment when the caller names none.
pub const CORE_CATEGORIES: [&str; 4] = ["Patient", "Observation", "Condition", "MedicationRequest"];

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// MCP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// FHIR transport configuration.
    #[serde(default)]
    pub fhir: FhirConfig,

    /// Data-quality assessment configuration.
    #[serde(default)]
    pub assessment: AssessmentConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// MCP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Name reported in `initialize`.
    pub name: String,

    /// Maximum size of one JSON-RPC line in bytes.
    pub max_message_bytes: usize,

    /// Maximum number of tool calls in flight at once.
    pub max_concurrent_calls: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "fhir-mcp".to_string(),
            max_message_bytes: 4 * 1024 * 1024,
            max_concurrent_calls: 16,
        }
    }
}

/// FHIR transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FhirConfig {
    /// Whole-request timeout, including the body read.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// TCP/TLS connect timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent to FHIR servers.
    pub user_agent: String,
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("fhir-mcp/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Data-quality assessment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Categories scanned when the caller does not name one.
    pub default_categories: Vec<String>,

    /// Maximum categories probed concurrently.
    pub concurrency: usize,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            default_categories: CORE_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            concurrency: 4,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Config {
    /// Load configuration from an optional JSON file plus `FHIR_MCP_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration file. Missing sections fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FHIR_MCP_TIMEOUT") {
            self.fhir.timeout = humantime_serde::re::humantime::parse_duration(&raw)
                .map_err(|e| Error::config(format!("FHIR_MCP_TIMEOUT={raw}: {e}")))?;
        }
        if let Some(raw) = lookup("FHIR_MCP_MAX_CONCURRENT_CALLS") {
            self.server.max_concurrent_calls = raw.parse().map_err(|e| {
                Error::config(format!("FHIR_MCP_MAX_CONCURRENT_CALLS={raw}: {e}"))
            })?;
        }
        if let Some(level) = lookup("FHIR_MCP_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("FHIR_MCP_LOG_FORMAT") {
            self.observability.json_logs = format.eq_ignore_ascii_case("json");
        }
        Ok(())
    }

    /// Reject settings that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_message_bytes == 0 {
            return Err(Error::config("server.max_message_bytes must be positive"));
        }
        if self.server.max_concurrent_calls == 0 {
            return Err(Error::config("server.max_concurrent_calls must be positive"));
        }
        if self.assessment.concurrency == 0 {
            return Err(Error::config("assessment.concurrency must be positive"));
        }
        if self.fhir.timeout.is_zero() {
            return Err(Error::config("fhir.timeout must be positive"));
        }
        Ok(())
    }
}
