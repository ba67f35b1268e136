//! The `ServerHandler` implementation: list/dispatch glue between the MCP transport and the
//! four tools in `crate::tools`.
//!
//! Grounded on `handler.rs`'s `JulieServerHandler`: a struct of `Arc`-wrapped shared state, a
//! `handle_list_tools_request` that delegates to the generated tools enum, and a
//! `handle_call_tool_request` that parses the request into that enum and dispatches by variant.
//! Much smaller here — no workspace index, no embedding engine — because the tool surface is
//! four operations instead of Julie's code-intelligence suite.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rust_mcp_sdk::mcp_server::ServerHandler;
use rust_mcp_sdk::schema::schema_utils::CallToolError;
use rust_mcp_sdk::schema::{
    CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult, RpcError,
};
use rust_mcp_sdk::McpServer;
use tracing::{debug, error, info};

use crate::cache::ByteCache;
use crate::checkpoint::CheckpointStore;
use crate::config::EngineConfig;
use crate::mapped_store::{self, MappedFileStore};
use crate::replace::ReplaceCoordinator;
use crate::tools::StructEditTools;
use crate::transaction::TransactionManager;
use crate::worker::BlockingPool;

/// Every core component a tool call might need, wrapped once and shared across requests.
pub struct StructEditHandler {
    pub store: Arc<MappedFileStore>,
    pub cache: Arc<ByteCache>,
    pub transactions: Arc<TransactionManager>,
    pub checkpoints: Option<Arc<CheckpointStore>>,
    pub coordinator: ReplaceCoordinator,
    pub config: EngineConfig,
}

impl StructEditHandler {
    /// Build the handler with a fresh blocking pool sized from `config` and an optional
    /// on-disk checkpoint store at `checkpoint_db`. `checkpoint_db` of `None` runs with
    /// checkpoints disabled rather than an in-memory store, since a process-owned store that
    /// disappears on restart would make `checkpoint: "name"` silently useless.
    pub fn new(config: EngineConfig, checkpoint_db: Option<PathBuf>) -> anyhow::Result<Self> {
        let pool = BlockingPool::new(config.worker_pool_size);
        let store = mapped_store::new_store(pool);
        let cache = Arc::new(ByteCache::new(config.cache_ceiling_bytes));
        let transactions = Arc::new(TransactionManager::new());

        let checkpoints = match checkpoint_db {
            Some(path) => Some(Arc::new(CheckpointStore::open(&path)?)),
            None => None,
        };

        let coordinator = ReplaceCoordinator::new(
            transactions.clone(),
            store.clone(),
            cache.clone(),
            checkpoints.clone(),
            config.clone(),
        );

        Ok(Self {
            store,
            cache,
            transactions,
            checkpoints,
            coordinator,
            config,
        })
    }
}

#[async_trait]
impl ServerHandler for StructEditHandler {
    async fn handle_list_tools_request(
        &self,
        _request: ListToolsRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<ListToolsResult, RpcError> {
        let tools = StructEditTools::tools();
        debug!(count = tools.len(), "listing tools");
        Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools,
        })
    }

    async fn handle_call_tool_request(
        &self,
        request: CallToolRequest,
        _runtime: Arc<dyn McpServer>,
    ) -> std::result::Result<CallToolResult, CallToolError> {
        debug!(tool = %request.params.name, "dispatching tool call");
        let tool_name = request.params.name.clone();

        let tool_params: StructEditTools = StructEditTools::try_from(request.params)
            .map_err(|e| {
                error!(error = %e, "failed to parse tool parameters");
                CallToolError::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid tool parameters: {e}"),
                ))
            })?;

        let result = match &tool_params {
            StructEditTools::ReadFileTool(tool) => tool.call_tool(self).await,
            StructEditTools::WriteFileTool(tool) => tool.call_tool(self).await,
            StructEditTools::SearchTool(tool) => tool.call_tool(self).await,
            StructEditTools::TextReplaceTool(tool) => tool.call_tool(self).await,
        };

        match result {
            Ok(call_result) => {
                info!(tool = %tool_name, "tool call succeeded");
                Ok(call_result)
            }
            Err(e) => {
                error!(tool = %tool_name, error = %e, "tool call failed");
                Err(CallToolError::new(std::io::Error::other(e.to_string())))
            }
        }
    }
}
