//! The fixed catalog of read-only FHIR operations.
//!
//! Every call opens one [`FhirClient`], performs one logical task and closes
//! the client before returning.

use crate::fhir::assess::{assess, select_categories};
use crate::fhir::client::{Endpoint, FhirClient, FhirTransport, QueryParams};
use crate::tools::catalog::{ParamDef, ParamType, ToolCatalog, ToolEntry};
use crate::types::{AssessmentConfig, Config, Error, FhirConfig, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::Instrument;

/// Inclusive bounds of the `_count` parameter.
pub const COUNT_MIN: i64 = 1;
pub const COUNT_MAX: i64 = 1000;

// =============================================================================
// Operation table
// =============================================================================

/// A search filter: tool parameter name and its query-string name.
#[derive(Debug, Clone, Copy)]
pub struct Filter {
    pub param: &'static str,
    pub wire: &'static str,
    pub description: &'static str,
}

const fn filter(param: &'static str, description: &'static str) -> Filter {
    Filter {
        param,
        wire: param,
        description,
    }
}

/// A parameterized search against one resource type.
#[derive(Debug, Clone, Copy)]
pub struct SearchOperation {
    pub tool: &'static str,
    pub resource: &'static str,
    pub description: &'static str,
    pub filters: &'static [Filter],
    pub default_count: i64,
}

const PATIENT_FILTER: Filter = filter("patient", "Patient ID to scope results");

pub const SEARCH_OPERATIONS: &[SearchOperation] = &[
    SearchOperation {
        tool: "search_patients",
        resource: "Patient",
        description: "Search Patient resources. Leave all filters empty to list the first N patients.",
        filters: &[
            filter("name", "Given or family name to match"),
            filter("family", "Family name only"),
        ],
        default_count: 10,
    },
    SearchOperation {
        tool: "search_observations",
        resource: "Observation",
        description: "Query Observation resources (vitals, labs, etc.).",
        filters: &[PATIENT_FILTER],
        default_count: 10,
    },
    SearchOperation {
        tool: "search_conditions",
        resource: "Condition",
        description: "Find Condition resources (diagnoses).",
        filters: &[
            PATIENT_FILTER,
            filter("code", "SNOMED or ICD-10 code"),
            Filter {
                param: "clinical_status",
                wire: "clinical-status",
                description: "active | resolved | inactive",
            },
        ],
        default_count: 10,
    },
    SearchOperation {
        tool: "search_medication_requests",
        resource: "MedicationRequest",
        description: "Query prescribed/planned medications.",
        filters: &[
            PATIENT_FILTER,
            filter("status", "active | completed | stopped | on-hold"),
            filter("intent", "order | plan | proposal"),
        ],
        default_count: 10,
    },
    SearchOperation {
        tool: "search_diagnostic_reports",
        resource: "DiagnosticReport",
        description: "Query lab results, imaging reports, etc.",
        filters: &[
            PATIENT_FILTER,
            filter("status", "final | preliminary | amended"),
            filter("category", "LAB | RAD | etc."),
        ],
        default_count: 10,
    },
    SearchOperation {
        tool: "search_care_plans",
        resource: "CarePlan",
        description: "Find care plans (treatment plans, pathways).",
        filters: &[
            PATIENT_FILTER,
            filter("status", "active | completed | cancelled | draft"),
            filter("category", "e.g., diabetes-management | encounter"),
        ],
        default_count: 10,
    },
];

/// Every invokable operation.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    GetPatient,
    Search(&'static SearchOperation),
    CapabilityStatement,
    FindPatientsWithConditions,
    AssessDataQuality,
}

impl Operation {
    pub fn all() -> Vec<Operation> {
        let mut ops = vec![Operation::GetPatient];
        ops.extend(SEARCH_OPERATIONS.iter().map(Operation::Search));
        ops.extend([
            Operation::CapabilityStatement,
            Operation::FindPatientsWithConditions,
            Operation::AssessDataQuality,
        ]);
        ops
    }

    pub fn from_tool_id(tool_id: &str) -> Option<Operation> {
        Self::all().into_iter().find(|op| op.tool_id() == tool_id)
    }

    pub fn tool_id(&self) -> &'static str {
        match self {
            Operation::GetPatient => "get_patient",
            Operation::Search(search) => search.tool,
            Operation::CapabilityStatement => "get_capability_statement",
            Operation::FindPatientsWithConditions => "find_patients_with_conditions",
            Operation::AssessDataQuality => "assess_data_quality",
        }
    }

    /// Catalog metadata for this operation.
    pub fn entry(&self) -> ToolEntry {
        let mut parameters = vec![ParamDef::required(
            "fhir_base_url",
            ParamType::String,
            "FHIR server base URL",
        )];

        let description = match self {
            Operation::GetPatient => {
                parameters.push(ParamDef::required(
                    "patient_id",
                    ParamType::String,
                    "FHIR Patient ID",
                ));
                "Retrieve a single Patient resource by ID."
            }
            Operation::Search(search) => {
                parameters.extend(
                    search
                        .filters
                        .iter()
                        .map(|f| ParamDef::optional(f.param, f.description)),
                );
                parameters.push(count_param(search.default_count));
                search.description
            }
            Operation::CapabilityStatement => {
                "Fetch the server's CapabilityStatement (supported resources and interactions)."
            }
            Operation::FindPatientsWithConditions => {
                parameters.push(ParamDef::optional("code", "Condition code to filter on"));
                parameters.push(count_param(100));
                "Return distinct Patient IDs referenced by Condition resources. \
                 Useful when Patient records are missing but Conditions exist."
            }
            Operation::AssessDataQuality => {
                parameters.push(ParamDef::optional(
                    "resource_type",
                    "Limit scan to one resource type",
                ));
                "Run a quality assessment across (or for) resource types."
            }
        };

        parameters.push(ParamDef::optional(
            "auth_token",
            "Bearer token for authentication",
        ));

        ToolEntry {
            id: self.tool_id().to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

fn count_param(default: i64) -> ParamDef {
    ParamDef::required(
        "_count",
        ParamType::BoundedInt {
            min: COUNT_MIN,
            max: COUNT_MAX,
        },
        "Max results per page",
    )
    .with_default(json!(default))
}

/// Catalog holding every operation.
pub fn default_catalog() -> Result<ToolCatalog> {
    let mut catalog = ToolCatalog::new();
    for op in Operation::all() {
        catalog.register(op.entry())?;
    }
    Ok(catalog)
}

// =============================================================================
// Arguments
// =============================================================================

/// Validated tool arguments.
#[derive(Debug)]
struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// Non-empty string argument.
    fn str(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn required_str(&self, name: &str) -> Result<&str> {
        self.str(name)
            .ok_or_else(|| Error::validation(format!("{name} cannot be empty")))
    }

    /// `_count` followed by every supplied filter, renamed for the wire.
    fn search_query(&self, filters: &[Filter]) -> QueryParams {
        let mut query = QueryParams::new();
        if let Some(count) = self.0.get("_count").and_then(Value::as_i64) {
            query.push(("_count".to_string(), count.to_string()));
        }
        for f in filters {
            if let Some(value) = self.str(f.param) {
                query.push((f.wire.to_string(), value.to_string()));
            }
        }
        query
    }
}

/// FHIR logical ids become a path segment; keep them to a single segment.
fn validate_resource_id(id: &str) -> Result<()> {
    if id.chars().any(|c| matches!(c, '/' | '?' | '#') || c.is_whitespace()) {
        return Err(Error::validation(format!("invalid resource id '{id}'")));
    }
    Ok(())
}

/// Distinct patient ids referenced by `subject` in a Condition bundle, sorted.
pub fn patient_ids_from_conditions(bundle: &Value) -> Vec<String> {
    let ids: BTreeSet<String> = bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(|entry| {
            entry
                .get("resource")?
                .get("subject")?
                .get("reference")?
                .as_str()
        })
        .filter(|reference| reference.starts_with("Patient/"))
        .filter_map(|reference| reference.rsplit('/').next())
        // A bare `Patient/` reference names no patient; it is not reported as "".
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    ids.into_iter().collect()
}

// =============================================================================
// Facade
// =============================================================================

/// Executes catalog operations.
#[derive(Debug)]
pub struct FhirTools {
    catalog: ToolCatalog,
    fhir: FhirConfig,
    assessment: AssessmentConfig,
}

impl FhirTools {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            catalog: default_catalog()?,
            fhir: config.fhir.clone(),
            assessment: config.assessment.clone(),
        })
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Validate `arguments` and run the named tool.
    pub async fn call(&self, tool_id: &str, arguments: Value) -> Result<Value> {
        let op = Operation::from_tool_id(tool_id)
            .filter(|_| self.catalog.has_tool(tool_id))
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", tool_id)))?;

        let mut arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let errors = self.catalog.validate_params(tool_id, &arguments)?;
        if !errors.is_empty() {
            return Err(Error::validation(errors.join("; ")));
        }
        self.catalog.fill_defaults(tool_id, &mut arguments)?;
        let args = match arguments {
            Value::Object(map) => ToolArgs(map),
            _ => return Err(Error::validation("Parameters must be a JSON object")),
        };

        let span = tracing::info_span!("tool_call", tool = tool_id, call_id = %uuid::Uuid::new_v4());
        self.execute(op, args).instrument(span).await
    }

    async fn execute(&self, op: Operation, args: ToolArgs) -> Result<Value> {
        let endpoint = Endpoint::new(
            args.required_str("fhir_base_url")?,
            args.str("auth_token").map(str::to_string),
            &self.fhir,
        );
        if let Operation::GetPatient = op {
            validate_resource_id(args.required_str("patient_id")?)?;
        }

        let client = FhirClient::connect(endpoint)?;
        let result = self.run(op, &client, &args).await;
        client.close();
        result
    }

    async fn run(&self, op: Operation, client: &FhirClient, args: &ToolArgs) -> Result<Value> {
        tracing::debug!(tool = op.tool_id(), base_url = client.base_url(), "running tool");
        match op {
            Operation::GetPatient => {
                let path = format!("Patient/{}", args.required_str("patient_id")?);
                Ok(client.get(&path, &[]).await.into_json())
            }
            Operation::Search(search) => {
                let query = args.search_query(search.filters);
                Ok(client.get(search.resource, &query).await.into_json())
            }
            Operation::CapabilityStatement => Ok(client.get("metadata", &[]).await.into_json()),
            Operation::FindPatientsWithConditions => {
                let query = args.search_query(&[filter("code", "")]);
                let bundle = client.get("Condition", &query).await.into_json();
                Ok(json!(patient_ids_from_conditions(&bundle)))
            }
            Operation::AssessDataQuality => {
                let categories = select_categories(
                    args.str("resource_type"),
                    &self.assessment.default_categories,
                );
                let report = assess(client, &categories, self.assessment.concurrency).await;
                Ok(serde_json::to_value(report)?)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
