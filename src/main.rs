use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rust_mcp_sdk::error::SdkResult;
use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, ServerCapabilities, ServerCapabilitiesTools,
    LATEST_PROTOCOL_VERSION,
};
use rust_mcp_sdk::{
    mcp_server::{server_runtime, ServerRuntime},
    McpServer, StdioTransport, TransportOptions,
};

use structedit::config::EngineConfig;
use structedit::handler::StructEditHandler;

/// Where the checkpoint database lives, in priority order: `--checkpoint-db <path>` CLI
/// argument, `STRUCTEDIT_CHECKPOINT_DB` environment variable, or `.structedit/checkpoints.db`
/// under the current directory. Returning `None` disables checkpoints rather than falling back
/// to an in-memory store that would make `checkpoint: "name"` silently useless across restarts.
fn get_checkpoint_path() -> Option<PathBuf> {
    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|a| a == "--checkpoint-db") {
        if let Some(path) = args.get(pos + 1) {
            return Some(PathBuf::from(path));
        }
    }

    if let Ok(path) = env::var("STRUCTEDIT_CHECKPOINT_DB") {
        return Some(PathBuf::from(path));
    }

    let default_dir = PathBuf::from(".structedit");
    match fs::create_dir_all(&default_dir) {
        Ok(()) => Some(default_dir.join("checkpoints.db")),
        Err(e) => {
            eprintln!("warning: could not create .structedit directory: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> SdkResult<()> {
    let logs_dir = PathBuf::from(".structedit").join("logs");
    fs::create_dir_all(&logs_dir).unwrap_or_else(|e| {
        eprintln!("warning: could not create log directory {logs_dir:?}: {e}");
    });

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("structedit=info"));

    // MCP servers must not log to stdout: it carries JSON-RPC framing, nothing else. All
    // logging goes to a daily-rolling file instead.
    let file_appender = rolling::daily(&logs_dir, "structedit.log");
    let (non_blocking_file, _file_guard) = non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_target(true)
                .with_ansi(false),
        )
        .init();

    info!("starting structedit server");

    let checkpoint_path = get_checkpoint_path();
    debug!(?checkpoint_path, "checkpoint store configured");

    let handler = StructEditHandler::new(EngineConfig::default(), checkpoint_path)
        .map_err(|e| rust_mcp_sdk::error::McpSdkError::Io(std::io::Error::other(e.to_string())))?;

    let server_details = InitializeResult {
        server_info: Implementation {
            name: "structedit".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Structured Text Replace Server".to_string()),
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools { list_changed: None }),
            ..Default::default()
        },
        meta: None,
        instructions: Some(
            "Use read_file/search to locate a target, then text_replace with a highlight \
             selecting it by name, pattern, line range, or sub-block. Pass dry_run: true to \
             preview a replacement's diff before committing it."
                .to_string(),
        ),
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    };

    let transport = StdioTransport::new(TransportOptions::default())?;
    let server: Arc<ServerRuntime> = server_runtime::create_server(server_details, transport, handler);

    info!("structedit server ready");
    if let Err(e) = server.start().await {
        error!(error = %e, "server failed to start");
        return Err(e);
    }

    info!("structedit server stopped");
    Ok(())
}
