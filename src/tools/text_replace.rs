//! `text_replace`: the full §4.8 state machine, exposed over the wire. Deserializes the
//! target-specifier dialect straight into `TargetSpec` and delegates everything else to
//! `ReplaceCoordinator`.

use anyhow::Result;
use rust_mcp_sdk::macros::{mcp_tool, JsonSchema};
use rust_mcp_sdk::schema::{CallToolResult, TextContent};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::handler::StructEditHandler;
use crate::replace::ReplaceOptions;

#[mcp_tool(
    name = "text_replace",
    description = "Replace a named target (function, method, section, pattern, or line range) in a file, validating syntax and indentation before committing.",
    title = "Structured Text Replace",
    idempotent_hint = false,
    destructive_hint = true,
    open_world_hint = false,
    read_only_hint = false,
    meta = r#"{"category": "editing", "safety": "transactional"}"#
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TextReplaceTool {
    pub path: String,
    /// Either a bare name, a list of names to try in order, or an object selecting a pattern,
    /// line range, sub-block, or related-files replacement (see the target-specifier dialect).
    /// Kept as a raw JSON value here since the dialect is a hand-rolled untagged union that
    /// schemars can't derive a tool-input schema for; `call_tool` deserializes it into
    /// `TargetSpec` itself.
    pub highlight: serde_json::Value,
    pub replace_with: String,
    #[serde(default)]
    pub checkpoint: Option<String>,
    #[serde(default)]
    pub auto_checkpoint: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub batch_mode: bool,
    #[serde(default)]
    pub process_imports: bool,
}

impl TextReplaceTool {
    pub async fn call_tool(&self, handler: &StructEditHandler) -> Result<CallToolResult> {
        debug!(path = %self.path, "text_replace");
        let path = std::path::Path::new(&self.path);
        let highlight: crate::target_spec::TargetSpec =
            serde_json::from_value(self.highlight.clone())?;

        let opts = ReplaceOptions {
            checkpoint: self.checkpoint.clone(),
            auto_checkpoint: self.auto_checkpoint,
            dry_run: self.dry_run,
            batch_mode: self.batch_mode,
            process_imports: self.process_imports,
        };

        let outcome = handler
            .coordinator
            .replace(path, &highlight, &self.replace_with, &opts)
            .await?;

        let rendered = serde_json::to_string(&outcome)?;
        Ok(CallToolResult::text_content(vec![TextContent::from(rendered)]))
    }
}
