//! MCP (Model Context Protocol) stdio transport.
//!
//! Newline-delimited JSON-RPC 2.0 on stdin/stdout. Tool calls run
//! concurrently; responses funnel through a single writer task.

pub mod codec;
pub mod router;
pub mod server;

pub use server::McpServer;
