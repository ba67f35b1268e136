//! Syntax and type-compatibility validation (§4.7).
//!
//! Parses the replacement in isolation, then the whole spliced file, using the same
//! `tree-sitter-python` entry point `parser::code` uses to find targets in the first place — a
//! file that can locate a target but can't reparse after substitution is exactly the case this
//! module exists to catch. Signature comparison walks the two `TargetMetadata` bags `parser::code`
//! already extracts rather than re-parsing from scratch.

use tree_sitter::Parser;

use crate::error::{EngineError, EngineResult};
use crate::parser::TargetMetadata;

#[derive(Debug, Clone, Default)]
pub struct CompatibilityWarnings {
    pub messages: Vec<String>,
    pub critical: bool,
}

impl CompatibilityWarnings {
    fn warn(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    fn critical(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
        self.critical = true;
    }
}

/// Parse `text` on its own; on failure report the first offending line with a caret.
pub fn check_isolated(text: &str) -> EngineResult<()> {
    parse_or_report(text)
}

/// Parse the whole post-splice file; failure here means the replacement was syntactically valid
/// alone but broke the surrounding file (e.g. closed a scope it shouldn't have).
pub fn check_whole_file(content: &str) -> EngineResult<()> {
    parse_or_report(content)
}

fn parse_or_report(text: &str) -> EngineResult<()> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| EngineError::SyntaxInvalid {
            line: 0,
            column: 0,
            offending_line: String::new(),
            message: format!("parser setup failed: {e}"),
        })?;

    let tree = parser.parse(text, None).ok_or_else(|| EngineError::SyntaxInvalid {
        line: 0,
        column: 0,
        offending_line: String::new(),
        message: "parser produced no tree".to_string(),
    })?;

    if let Some(error_node) = first_error_node(tree.root_node()) {
        let pos = error_node.start_position();
        let line = text.lines().nth(pos.row).unwrap_or("").to_string();
        return Err(EngineError::SyntaxInvalid {
            line: pos.row + 1,
            column: pos.column,
            offending_line: line,
            message: "unexpected syntax".to_string(),
        });
    }
    Ok(())
}

fn first_error_node(node: tree_sitter::Node) -> Option<tree_sitter::Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error_node(child) {
            return Some(found);
        }
    }
    None
}

/// Compare an original function's metadata against its replacement's, warning on removed
/// parameters, added required parameters, and annotation changes. Removing a parameter or adding
/// a required one is critical.
pub fn check_signature_compatibility(
    original: &TargetMetadata,
    replacement: &TargetMetadata,
) -> CompatibilityWarnings {
    let mut warnings = CompatibilityWarnings::default();

    for param in &original.parameters {
        if !replacement.parameters.contains(param) {
            warnings.critical(format!("parameter '{param}' was removed"));
        }
    }
    for param in &replacement.parameters {
        if !original.parameters.contains(param) {
            // Treated as "required" since the dialect's line-scanner/tree path does not track
            // defaults separately; a caller adding any new bare parameter is assumed required.
            warnings.critical(format!("new parameter '{param}' was added"));
        }
    }

    if original.return_annotation != replacement.return_annotation {
        warnings.warn(format!(
            "return annotation changed from {:?} to {:?}",
            original.return_annotation, replacement.return_annotation
        ));
    }

    warnings
}

/// Compare class-shape metadata, warning on removed base classes.
pub fn check_class_compatibility(
    original: &TargetMetadata,
    replacement: &TargetMetadata,
) -> CompatibilityWarnings {
    let mut warnings = CompatibilityWarnings::default();
    for base in &original.base_classes {
        if !replacement.base_classes.contains(base) {
            warnings.warn(format!("base class '{base}' was removed"));
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_python_passes_isolated_check() {
        assert!(check_isolated("def f():\n    return 1\n").is_ok());
    }

    #[test]
    fn invalid_python_reports_syntax_error() {
        let err = check_isolated("def f(:\n    return 1\n").unwrap_err();
        assert!(matches!(err, EngineError::SyntaxInvalid { .. }));
    }

    #[test]
    fn removed_parameter_is_critical() {
        let original = TargetMetadata {
            parameters: vec!["x".to_string(), "y".to_string()],
            ..Default::default()
        };
        let replacement = TargetMetadata {
            parameters: vec!["x".to_string()],
            ..Default::default()
        };
        let warnings = check_signature_compatibility(&original, &replacement);
        assert!(warnings.critical);
    }

    #[test]
    fn same_parameters_is_not_critical() {
        let original = TargetMetadata {
            parameters: vec!["x".to_string()],
            ..Default::default()
        };
        let warnings = check_signature_compatibility(&original, &original.clone());
        assert!(!warnings.critical);
        assert!(warnings.messages.is_empty());
    }

    #[test]
    fn removed_base_class_warns_but_is_not_critical() {
        let original = TargetMetadata {
            base_classes: vec!["Base".to_string()],
            ..Default::default()
        };
        let replacement = TargetMetadata::default();
        let warnings = check_class_compatibility(&original, &replacement);
        assert!(!warnings.critical);
        assert_eq!(warnings.messages.len(), 1);
    }
}
