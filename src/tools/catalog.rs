//! Tool catalog — typed metadata, parameter validation, input schemas.
//!
//! Owns tool *metadata* only; execution lives in [`crate::tools::operations`].

use crate::types::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

// =============================================================================
// Parameter types
// =============================================================================

/// Parameter type for tool inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    /// Integer within an inclusive range.
    BoundedInt { min: i64, max: i64 },
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Validate a JSON value against this parameter type.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), String> {
        match self {
            ParamType::String => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(format!("expected string, got {}", value_type_name(value)))
                }
            }
            ParamType::BoundedInt { min, max } => match value.as_i64() {
                Some(n) if (*min..=*max).contains(&n) => Ok(()),
                Some(n) => Err(format!("{} is outside {}..={}", n, min, max)),
                None if value.is_u64() => Err(format!("{} is outside {}..={}", value, min, max)),
                None => Err(format!("expected integer, got {}", value_type_name(value))),
            },
            ParamType::Optional(inner) => {
                if value.is_null() {
                    Ok(())
                } else {
                    inner.validate(value)
                }
            }
        }
    }

    /// JSON Schema fragment describing this type.
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::BoundedInt { min, max } => {
                json!({"type": "integer", "minimum": min, "maximum": max})
            }
            ParamType::Optional(inner) => {
                let mut schema = inner.json_schema();
                if let Some(ty) = schema.get("type").cloned() {
                    schema["type"] = json!([ty, "null"]);
                }
                schema
            }
        }
    }
}

fn value_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Parameter definition
// =============================================================================

/// A single parameter definition for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            default: None,
        }
    }

    pub fn optional(name: &str, description: &str) -> Self {
        Self::required(
            name,
            ParamType::Optional(Box::new(ParamType::String)),
            description,
        )
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.param_type, ParamType::Optional(_))
    }

    fn json_schema(&self) -> Value {
        let mut schema = self.param_type.json_schema();
        schema["description"] = json!(self.description);
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

// =============================================================================
// Tool entry
// =============================================================================

/// Complete tool metadata entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEntry {
    pub id: String,
    pub description: String,
    pub parameters: Vec<ParamDef>,
}

impl ToolEntry {
    /// JSON Schema object for the tool's arguments.
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.is_required())
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

// =============================================================================
// Tool catalog
// =============================================================================

/// In-memory tool catalog. Owns metadata, not implementations.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    entries: HashMap<String, ToolEntry>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a tool entry.
    pub fn register(&mut self, entry: ToolEntry) -> Result<()> {
        if entry.id.is_empty() {
            return Err(Error::validation("Tool id cannot be empty"));
        }
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Get a tool entry by id.
    pub fn get(&self, tool_id: &str) -> Option<&ToolEntry> {
        self.entries.get(tool_id)
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, tool_id: &str) -> bool {
        self.entries.contains_key(tool_id)
    }

    /// List all tool ids.
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// List all tool entries, sorted by id.
    pub fn list_entries(&self) -> Vec<&ToolEntry> {
        let mut entries: Vec<&ToolEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Validate parameters against a tool's parameter definitions.
    ///
    /// Returns a list of validation errors (empty = valid).
    pub fn validate_params(&self, tool_id: &str, params: &Value) -> Result<Vec<String>> {
        let entry = self
            .entries
            .get(tool_id)
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", tool_id)))?;

        let param_map = params
            .as_object()
            .ok_or_else(|| Error::validation("Parameters must be a JSON object"))?;

        let mut errors = Vec::new();

        for param_def in &entry.parameters {
            if param_def.is_required() && !param_map.contains_key(&param_def.name) {
                errors.push(format!("Missing required parameter: {}", param_def.name));
            }
        }

        let known_names: HashMap<&str, &ParamDef> = entry
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();

        for (key, value) in param_map {
            if let Some(param_def) = known_names.get(key.as_str()) {
                if let Err(e) = param_def.param_type.validate(value) {
                    errors.push(format!("Parameter '{}': {}", key, e));
                }
            } else {
                errors.push(format!("Unknown parameter: {}", key));
            }
        }

        Ok(errors)
    }

    /// Fill in default values for missing optional parameters.
    pub fn fill_defaults(&self, tool_id: &str, params: &mut Value) -> Result<()> {
        let entry = self
            .entries
            .get(tool_id)
            .ok_or_else(|| Error::not_found(format!("Unknown tool: {}", tool_id)))?;

        if let Some(map) = params.as_object_mut() {
            for param_def in &entry.parameters {
                if !map.contains_key(&param_def.name) {
                    if let Some(default) = &param_def.default {
                        map.insert(param_def.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(())
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> ToolEntry {
        ToolEntry {
            id: "search_patients".to_string(),
            description: "Search Patient resources".to_string(),
            parameters: vec![
                ParamDef::required("fhir_base_url", ParamType::String, "FHIR server base URL"),
                ParamDef::optional("name", "Given or family name to match"),
                ParamDef::required(
                    "_count",
                    ParamType::BoundedInt { min: 1, max: 1000 },
                    "Max results per page",
                )
                .with_default(json!(10)),
            ],
        }
    }

    fn catalog() -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        catalog.register(sample_entry()).unwrap();
        catalog
    }

    #[test]
    fn test_register_and_get() {
        let catalog = catalog();
        assert!(catalog.has_tool("search_patients"));
        assert!(!catalog.has_tool("nonexistent"));
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get("search_patients").unwrap().description,
            "Search Patient resources"
        );
    }

    #[test]
    fn test_register_empty_id_fails() {
        let mut catalog = ToolCatalog::new();
        let mut entry = sample_entry();
        entry.id = String::new();
        assert!(catalog.register(entry).is_err());
    }

    #[test]
    fn test_validate_params_valid() {
        let params = json!({"fhir_base_url": "http://x", "name": null, "_count": 1000});
        let errors = catalog().validate_params("search_patients", &params).unwrap();
        assert!(errors.is_empty(), "Expected no errors, got: {:?}", errors);
    }

    #[test]
    fn test_validate_params_missing_required() {
        let errors = catalog()
            .validate_params("search_patients", &json!({}))
            .unwrap();
        assert_eq!(errors, vec!["Missing required parameter: fhir_base_url"]);
    }

    #[test]
    fn test_validate_params_count_bounds() {
        let catalog = catalog();
        for bad in [json!(0), json!(1001), json!(-5), json!(u64::MAX)] {
            let params = json!({"fhir_base_url": "http://x", "_count": bad});
            let errors = catalog.validate_params("search_patients", &params).unwrap();
            assert_eq!(errors.len(), 1, "{:?}", errors);
            assert!(errors[0].contains("outside 1..=1000"), "{:?}", errors);
        }

        let params = json!({"fhir_base_url": "http://x", "_count": "10"});
        let errors = catalog.validate_params("search_patients", &params).unwrap();
        assert!(errors[0].contains("expected integer"));
    }

    #[test]
    fn test_validate_params_wrong_type_and_unknown() {
        let params = json!({"fhir_base_url": 42, "bogus": true});
        let mut errors = catalog().validate_params("search_patients", &params).unwrap();
        errors.sort();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Parameter 'fhir_base_url': expected string"));
        assert!(errors[1].contains("Unknown parameter: bogus"));
    }

    #[test]
    fn test_validate_params_unknown_tool() {
        let err = ToolCatalog::new()
            .validate_params("nonexistent", &json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_validate_params_not_object() {
        assert!(catalog().validate_params("search_patients", &json!([])).is_err());
    }

    #[test]
    fn test_fill_defaults() {
        let catalog = catalog();
        let mut params = json!({"fhir_base_url": "http://x"});
        catalog.fill_defaults("search_patients", &mut params).unwrap();
        assert_eq!(params["_count"], 10);

        let mut params = json!({"fhir_base_url": "http://x", "_count": 5});
        catalog.fill_defaults("search_patients", &mut params).unwrap();
        assert_eq!(params["_count"], 5);
    }

    #[test]
    fn test_input_schema() {
        let schema = sample_entry().input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["fhir_base_url"]));
        assert_eq!(schema["properties"]["name"]["type"], json!(["string", "null"]));
        assert_eq!(schema["properties"]["_count"]["minimum"], 1);
        assert_eq!(schema["properties"]["_count"]["maximum"], 1000);
        assert_eq!(schema["properties"]["_count"]["default"], 10);
    }
}
