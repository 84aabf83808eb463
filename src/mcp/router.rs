//! JSON-RPC method routing for the MCP server.

use crate::tools::FhirTools;
use crate::types::{rpc_codes, Error};
use serde_json::{json, Value};

/// MCP protocol revision offered when the client does not ask for one.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Identity reported in `initialize`.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({"code": self.code, "message": self.message})
    }
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        Self::new(err.rpc_code(), err.to_string())
    }
}

/// Route one request to its handler.
pub async fn route(
    tools: &FhirTools,
    info: &ServerInfo,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    match method {
        "initialize" => Ok(initialize(info, &params)),
        "ping" => Ok(json!({})),
        "tools/list" => Ok(list_tools(tools)),
        "tools/call" => call_tool(tools, params).await,
        _ => Err(RpcError::new(
            rpc_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )),
    }
}

fn initialize(info: &ServerInfo, params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {"tools": {"listChanged": false}},
        "serverInfo": {"name": info.name, "version": info.version},
    })
}

fn list_tools(tools: &FhirTools) -> Value {
    let listed: Vec<Value> = tools
        .catalog()
        .list_entries()
        .into_iter()
        .map(|entry| {
            json!({
                "name": entry.id,
                "description": entry.description,
                "inputSchema": entry.input_schema(),
            })
        })
        .collect();
    json!({ "tools": listed })
}

async fn call_tool(tools: &FhirTools, params: Value) -> Result<Value, RpcError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::new(rpc_codes::INVALID_PARAMS, "Missing required field: name"))?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    let result = tools.call(name, arguments).await?;
    tool_result(result)
}

/// Wrap a tool's output in an MCP `CallToolResult`.
fn tool_result(result: Value) -> Result<Value, RpcError> {
    let text = serde_json::to_string_pretty(&result).map_err(Error::from)?;
    let structured = match result {
        Value::Object(_) => result,
        other => json!({ "result": other }),
    };
    Ok(json!({
        "content": [{"type": "text", "text": text}],
        "structuredContent": structured,
        "isError": false,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;

    fn fixtures() -> (FhirTools, ServerInfo) {
        (
            FhirTools::new(&Config::default()).unwrap(),
            ServerInfo {
                name: "fhir-mcp".to_string(),
                version: "0.1.0".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let (tools, info) = fixtures();
        let result = route(&tools, &info, "initialize", json!({"protocolVersion": "2024-11-05"}))
            .await
            .unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "fhir-mcp");

        let result = route(&tools, &info, "initialize", Value::Null).await.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_tools_list() {
        let (tools, info) = fixtures();
        let result = route(&tools, &info, "tools/list", Value::Null).await.unwrap();
        let listed = result["tools"].as_array().unwrap();
        assert_eq!(listed.len(), 10);
        assert_eq!(listed[0]["name"], "assess_data_quality");
        assert_eq!(listed[0]["inputSchema"]["required"], json!(["fhir_base_url"]));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (tools, info) = fixtures();
        let err = route(&tools, &info, "resources/list", Value::Null).await.unwrap_err();
        assert_eq!(err.code, rpc_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_call_without_name() {
        let (tools, info) = fixtures();
        let err = route(&tools, &info, "tools/call", json!({})).await.unwrap_err();
        assert_eq!(err.code, rpc_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_call_unknown_tool_is_invalid_params() {
        let (tools, info) = fixtures();
        let err = route(&tools, &info, "tools/call", json!({"name": "nope", "arguments": {}}))
            .await
            .unwrap_err();
        assert_eq!(err.code, rpc_codes::INVALID_PARAMS);
        assert!(err.message.contains("Unknown tool: nope"));
    }

    #[test]
    fn test_tool_result_wraps_lists() {
        let wrapped = tool_result(json!(["1", "2"])).unwrap();
        assert_eq!(wrapped["structuredContent"], json!({"result": ["1", "2"]}));
        assert_eq!(wrapped["isError"], false);
        let text = wrapped["content"][0]["text"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!(["1", "2"]));
    }
}
