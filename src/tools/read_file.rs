//! `read_file`: decode a whole file, or an inclusive 1-indexed line range of one, through the
//! mapped-file store and byte cache.

use anyhow::Result;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::schema::{CallToolResult, TextContent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheKey;
use crate::encoding::Encoding;
use crate::handler::StructEditHandler;

#[mcp_tool(
    name = "read_file",
    description = "Read a file's contents, or an inclusive 1-indexed line range, decoding with the given or detected encoding.",
    title = "Read File",
    idempotent_hint = true,
    destructive_hint = false,
    open_world_hint = false,
    read_only_hint = true,
    meta = r#"{"category": "io"}"#
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ReadFileTool {
    pub path: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub start_line: Option<u64>,
    #[serde(default)]
    pub end_line: Option<u64>,
}

impl ReadFileTool {
    pub async fn call_tool(&self, handler: &StructEditHandler) -> Result<CallToolResult> {
        debug!(path = %self.path, "read_file");
        let path = std::path::Path::new(&self.path);
        let encoding = self.encoding.as_deref().and_then(Encoding::parse);

        let text = match (self.start_line, self.end_line) {
            (Some(start), Some(end)) => {
                let start = start as usize;
                let end = end as usize;
                let key = CacheKey::Range(self.path.clone(), start, end);
                match handler.cache.get(&key) {
                    Some(cached) => String::from_utf8_lossy(&cached).into_owned(),
                    None => {
                        // §6's line numbers are 1-indexed; the mapped store is 0-indexed.
                        let text = handler
                            .store
                            .read_lines(path, start.saturating_sub(1), end.saturating_sub(1), encoding)
                            .await?;
                        handler.cache.put(key, text.clone().into_bytes());
                        text
                    }
                }
            }
            _ => {
                let key = CacheKey::Whole(self.path.clone());
                match handler.cache.get(&key) {
                    Some(cached) => String::from_utf8_lossy(&cached).into_owned(),
                    None => {
                        let text = handler.store.read_whole(path, encoding).await?;
                        handler.cache.put(key, text.clone().into_bytes());
                        text
                    }
                }
            }
        };

        Ok(CallToolResult::text_content(vec![TextContent::from(text)]))
    }
}
