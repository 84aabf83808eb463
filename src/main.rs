//! fhir-mcp stdio server - main entry point.
//!
//! Serves the FHIR tool catalog over MCP on stdin/stdout. Logs go to stderr.

use clap::Parser;
use fhir_mcp::mcp::McpServer;
use fhir_mcp::tools::FhirTools;
use fhir_mcp::Config;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fhir-mcp", version, about = "FHIR tools over the Model Context Protocol")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, env = "FHIR_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if cli.json_logs {
        config.observability.json_logs = true;
    }

    // Initialize observability
    fhir_mcp::observability::init_tracing(&config.observability);

    let tools = FhirTools::new(&config)?;
    let server = McpServer::new(tools, config.server.clone());

    let cancel = server.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received");
            cancel.cancel();
        }
    });

    tracing::info!(
        "fhir-mcp {} starting (timeout={:?}, categories={:?})",
        env!("CARGO_PKG_VERSION"),
        config.fhir.timeout,
        config.assessment.default_categories,
    );

    server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
