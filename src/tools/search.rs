//! `search`: literal or regex scan over one file's contents, reusing the same cached read path
//! `read_file` does.

use anyhow::Result;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::schema::{CallToolResult, TextContent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheKey;
use crate::handler::StructEditHandler;
use crate::scan::{self, ScanOptions};

fn default_true() -> bool {
    true
}

#[mcp_tool(
    name = "search",
    description = "Search a file for a literal or regex pattern, returning line/column-addressed matches with context.",
    title = "Search File",
    idempotent_hint = true,
    destructive_hint = false,
    open_world_hint = false,
    read_only_hint = true,
    meta = r#"{"category": "search"}"#
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SearchTool {
    pub path: String,
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub whole_word: bool,
    /// When set, renders one `line:column: matched_text` line per result instead of JSON.
    #[serde(default)]
    pub simple_mode: Option<bool>,
}

impl SearchTool {
    pub async fn call_tool(&self, handler: &StructEditHandler) -> Result<CallToolResult> {
        debug!(path = %self.path, pattern = %self.pattern, "search");
        let path = std::path::Path::new(&self.path);

        let key = CacheKey::Whole(self.path.clone());
        let content = match handler.cache.get(&key) {
            Some(cached) => String::from_utf8_lossy(&cached).into_owned(),
            None => {
                let text = handler.store.read_whole(path, None).await?;
                handler.cache.put(key, text.clone().into_bytes());
                text
            }
        };

        let opts = ScanOptions {
            is_regex: self.is_regex,
            case_sensitive: self.case_sensitive,
            whole_word: self.whole_word,
        };
        let results = scan::search(&content, &self.pattern, &opts)?;

        let rendered = if self.simple_mode.unwrap_or(false) {
            results
                .iter()
                .map(|r| format!("{}:{}: {}", r.line, r.column, r.matched_text))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            serde_json::to_string(&results)?
        };

        Ok(CallToolResult::text_content(vec![TextContent::from(rendered)]))
    }
}
