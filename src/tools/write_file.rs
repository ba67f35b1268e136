//! `write_file`: overwrite (or create) a file through the same transactional temp-file-plus-
//! rename path the replace coordinator uses, so a `write_file` call can never leave a partial
//! write behind.

use anyhow::Result;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::schema::{CallToolResult, TextContent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encoding::{self, Encoding};
use crate::handler::StructEditHandler;

fn default_true() -> bool {
    true
}

#[mcp_tool(
    name = "write_file",
    description = "Write content to a file, creating parent directories by default. Staged through a temp file and renamed into place.",
    title = "Write File",
    idempotent_hint = false,
    destructive_hint = true,
    open_world_hint = false,
    read_only_hint = false,
    meta = r#"{"category": "io"}"#
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct WriteFileTool {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default = "default_true")]
    pub create_dirs: bool,
    /// When set, the returned status is a single word instead of a byte-count summary.
    #[serde(default)]
    pub simple_mode: Option<bool>,
}

impl WriteFileTool {
    pub async fn call_tool(&self, handler: &StructEditHandler) -> Result<CallToolResult> {
        debug!(path = %self.path, "write_file");
        let path = std::path::Path::new(&self.path);

        if self.create_dirs {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let encoding = self.encoding.as_deref().and_then(Encoding::parse).unwrap_or(Encoding::Utf8);
        let bytes = encoding::encode_lossy(&self.content, encoding);

        let txn_id = handler.transactions.begin();
        handler.transactions.acquire(&txn_id, path)?;
        if let Err(e) = handler.transactions.stage(&txn_id, path, &bytes) {
            handler.transactions.rollback(&txn_id)?;
            handler.transactions.forget(&txn_id);
            return Err(e.into());
        }
        handler.transactions.commit(&txn_id)?;
        handler.transactions.forget(&txn_id);

        handler.cache.invalidate_path(&self.path);
        handler.store.release(path);
        info!(path = %self.path, bytes = bytes.len(), "write_file committed");

        let status = if self.simple_mode.unwrap_or(false) {
            "ok".to_string()
        } else {
            format!("wrote {} bytes to {}", bytes.len(), self.path)
        };

        Ok(CallToolResult::text_content(vec![TextContent::from(status)]))
    }
}
