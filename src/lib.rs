//! Structured text-replace engine: locates a named syntactic target in a source file and
//! replaces it in place, preserving indentation, decorators, and surrounding comments, behind
//! an MCP tool surface.

pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod diff;
pub mod encoding;
pub mod error;
pub mod handler;
pub mod mapped_store;
pub mod parser;
pub mod reflow;
pub mod replace;
pub mod scan;
pub mod target_spec;
pub mod tools;
pub mod transaction;
pub mod validate;
pub mod worker;
