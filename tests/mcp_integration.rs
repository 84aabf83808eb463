//! MCP integration tests — JSON-RPC lines → server → tools → mock FHIR server.

mod common;

use common::start_mock_fhir;
use fhir_mcp::mcp::McpServer;
use fhir_mcp::tools::FhirTools;
use fhir_mcp::types::{rpc_codes, ServerConfig};
use fhir_mcp::Config;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

struct Client {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    server: tokio::task::JoinHandle<std::io::Result<()>>,
}

impl Client {
    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = self.lines.next_line().await.unwrap().expect("server closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, id: i64, method: &str, params: Value) -> Value {
        let message = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        self.send_raw(&message.to_string()).await;
        let response = self.recv().await;
        assert_eq!(response["id"], id);
        response
    }

    async fn finish(mut self) {
        self.writer.shutdown().await.unwrap();
        drop(self.writer);
        self.server.await.unwrap().unwrap();
    }
}

fn start_server(config: ServerConfig) -> Client {
    let (client_end, server_end) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let (client_read, client_write) = tokio::io::split(client_end);

    let server = McpServer::new(FhirTools::new(&Config::default()).unwrap(), config);
    let handle = tokio::spawn(async move { server.serve(server_read, server_write).await });

    Client {
        writer: client_write,
        lines: BufReader::new(client_read).lines(),
        server: handle,
    }
}

#[tokio::test]
async fn test_initialize_and_list_tools() {
    let mut client = start_server(ServerConfig::default());

    let init = client
        .request(1, "initialize", json!({"protocolVersion": "2025-03-26", "capabilities": {}}))
        .await;
    assert_eq!(init["jsonrpc"], "2.0");
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(init["result"]["serverInfo"]["name"], "fhir-mcp");

    // Notifications get no response; the next line answers the ping.
    client
        .send_raw(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await;
    let pong = client.request(2, "ping", Value::Null).await;
    assert_eq!(pong["result"], json!({}));

    let listed = client.request(3, "tools/list", json!({})).await;
    let names: Vec<&str> = listed["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"get_patient"));
    assert!(names.contains(&"assess_data_quality"));
    assert_eq!(names.len(), 10);

    client.finish().await;
}

#[tokio::test]
async fn test_tool_call_round_trip() {
    let mock = start_mock_fhir().await;
    let mut client = start_server(ServerConfig::default());

    let response = client
        .request(
            7,
            "tools/call",
            json!({
                "name": "find_patients_with_conditions",
                "arguments": {"fhir_base_url": mock.base_url()},
            }),
        )
        .await;

    let result = &response["result"];
    assert_eq!(result["isError"], false);
    assert_eq!(result["structuredContent"], json!({"result": ["1", "2"]}));
    let text = result["content"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<Value>(text).unwrap(), json!(["1", "2"]));

    let response = client
        .request(
            8,
            "tools/call",
            json!({
                "name": "get_patient",
                "arguments": {"fhir_base_url": mock.base_url(), "patient_id": "nope"},
            }),
        )
        .await;
    assert_eq!(
        response["result"]["structuredContent"]["issue"][0]["code"],
        "not-found"
    );

    client.finish().await;
}

#[tokio::test]
async fn test_assessment_keeps_category_order() {
    let mock = start_mock_fhir().await;
    let mut client = start_server(ServerConfig::default());

    let response = client
        .request(
            9,
            "tools/call",
            json!({
                "name": "assess_data_quality",
                "arguments": {"fhir_base_url": mock.base_url()},
            }),
        )
        .await;

    let expected = vec!["Patient", "Observation", "Condition", "MedicationRequest"];
    let structured = &response["result"]["structuredContent"]["resource_assessments"];
    let keys: Vec<&str> = structured
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, expected);

    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    let positions: Vec<usize> = expected
        .iter()
        .map(|name| text.find(&format!("\"{name}\":")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);

    client.finish().await;
}

#[tokio::test]
async fn test_protocol_errors() {
    let mut client = start_server(ServerConfig::default());

    client.send_raw("{not json").await;
    let parse = client.recv().await;
    assert_eq!(parse["id"], Value::Null);
    assert_eq!(parse["error"]["code"], rpc_codes::PARSE_ERROR);

    let unknown = client.request(2, "resources/read", json!({})).await;
    assert_eq!(unknown["error"]["code"], rpc_codes::METHOD_NOT_FOUND);

    let bad_args = client
        .request(
            3,
            "tools/call",
            json!({"name": "search_patients", "arguments": {"_count": 0}}),
        )
        .await;
    assert_eq!(bad_args["error"]["code"], rpc_codes::INVALID_PARAMS);
    let message = bad_args["error"]["message"].as_str().unwrap();
    assert!(message.contains("fhir_base_url"));
    assert!(message.contains("_count"));

    client.finish().await;
}

#[tokio::test]
async fn test_oversized_message_does_not_kill_the_session() {
    let config = ServerConfig {
        max_message_bytes: 128,
        ..ServerConfig::default()
    };
    let mut client = start_server(config);

    let huge = format!(
        r#"{{"jsonrpc":"2.0","id":1,"method":"ping","params":{{"pad":"{}"}}}}"#,
        "x".repeat(512)
    );
    client.send_raw(&huge).await;
    let rejected = client.recv().await;
    assert_eq!(rejected["error"]["code"], rpc_codes::INVALID_REQUEST);

    let pong = client.request(2, "ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));

    client.finish().await;
}

#[tokio::test]
async fn test_shutdown_stops_serving() {
    let (_client_end, server_end) = tokio::io::duplex(1024);
    let (server_read, server_write) = tokio::io::split(server_end);
    let server = McpServer::new(
        FhirTools::new(&Config::default()).unwrap(),
        ServerConfig::default(),
    );
    let token = server.cancellation_token();
    let handle = tokio::spawn(async move { server.serve(server_read, server_write).await });

    token.cancel();
    handle.await.unwrap().unwrap();
}
