//! The engine's error taxonomy.
//!
//! Every exceptional path in the pipeline ends here rather than in a panic. Variants carry
//! enough structure for the tool surface to build a response document without re-deriving
//! context the component that raised the error already had.

use std::path::PathBuf;
use thiserror::Error;

/// A candidate name surfaced by fuzzy target recovery, paired with its similarity score.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimilarCandidate {
    pub name: String,
    pub score: f64,
}

/// A single indentation violation, reported with enough context to fix it by hand.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndentationIssue {
    pub line_number: usize,
    pub offending_line: String,
    pub rendered_whitespace: String,
    pub hint: String,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("malformed target specifier: {reason}")]
    FormatError {
        reason: String,
        cleaned_candidate: String,
    },

    #[error("target '{requested}' not found")]
    TargetMissing {
        requested: String,
        similar: Vec<SimilarCandidate>,
        class_count: usize,
        function_count: usize,
    },

    #[error("syntax error at {line}:{column}: {message}")]
    SyntaxInvalid {
        line: usize,
        column: usize,
        offending_line: String,
        message: String,
    },

    #[error("indentation invalid ({} issue(s))", issues.len())]
    IndentationInvalid { issues: Vec<IndentationIssue> },

    #[error("incompatible replacement: {0}")]
    TypeIncompatible(String),

    #[error("file already locked by another transaction: {0}")]
    TransactionConflict(PathBuf),

    #[error("transaction already finished: {0}")]
    TransactionFinished(String),

    #[error("unknown transaction id: {0}")]
    UnknownTransaction(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("operation cancelled")]
    Cancelled,
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::IoFailure(e.to_string())
    }
}

impl From<regex::Error> for EngineError {
    fn from(e: regex::Error) -> Self {
        EngineError::FormatError {
            reason: e.to_string(),
            cleaned_candidate: String::new(),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::IoFailure(format!("checkpoint store: {e}"))
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            EngineError::Cancelled
        } else {
            EngineError::IoFailure(format!("worker task panicked: {e}"))
        }
    }
}
