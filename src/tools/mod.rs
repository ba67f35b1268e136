//! The MCP tool surface: four `#[mcp_tool]` structs that deserialize a request, delegate to the
//! core engine held by the handler, and render a result document.
//!
//! Grounded on `tools/mod.rs`'s module-declaration/re-export shape and `tools.rs`'s
//! `tool_box!`-generated dispatch enum, narrowed from Julie's code-intelligence surface down to
//! the four operations in the interface table (§6): `read_file`, `write_file`, `search`,
//! `text_replace`.

pub mod read_file;
pub mod search;
pub mod text_replace;
pub mod write_file;

pub use read_file::ReadFileTool;
pub use search::SearchTool;
pub use text_replace::TextReplaceTool;
pub use write_file::WriteFileTool;

use rust_mcp_sdk::tool_box;

tool_box!(StructEditTools, [ReadFileTool, WriteFileTool, SearchTool, TextReplaceTool]);
