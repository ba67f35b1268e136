//! The code dialect: locating `class`/`def`/`async def` targets in Python-like source.
//!
//! Grounded on `tools/refactoring/operations.rs`'s tree-walking (`find_function_or_method`,
//! `is_function_or_method`) for the syntactic path, and on `flux_mcp/parsers/python_parser.py`'s
//! `_find_class_or_method` for the line-scanner fallback's indentation-bounded block extension
//! and decorator/comment collection — the two are meant to agree on well-formed input.

use tree_sitter::{Node, Parser};

use crate::encoding;
use crate::error::{EngineError, EngineResult, SimilarCandidate};
use crate::parser::{
    collect_decorators, collect_leading_comments, collect_trailing_comments, ParserResult,
    TargetMetadata,
};

const COMMENT_PREFIX: &str = "#";

/// Candidate names visible at top level or as `Class.method`, used both to list targets in
/// `TargetMissing` errors and as the fuzzy-recovery candidate pool.
pub fn list_candidates(content: &str) -> Vec<String> {
    let mut names = Vec::new();
    let lines: Vec<&str> = content.lines().collect();
    let mut current_class: Option<(String, usize)> = None; // (name, indent width)

    for line in &lines {
        let indent_width = line.len() - line.trim_start().len();
        let trimmed = line.trim_start();

        if let Some((_, class_indent)) = &current_class {
            if !trimmed.is_empty() && indent_width <= *class_indent {
                current_class = None;
            }
        }

        if let Some(name) = parse_class_header(trimmed) {
            names.push(name.clone());
            current_class = Some((name, indent_width));
            continue;
        }

        if let Some(name) = parse_def_header(trimmed) {
            match &current_class {
                Some((class_name, class_indent)) if indent_width > *class_indent => {
                    names.push(format!("{class_name}.{name}"));
                }
                _ => names.push(name),
            }
        }
    }

    names
}

pub fn candidate_counts(content: &str) -> (usize, usize) {
    let names = list_candidates(content);
    let class_count = content
        .lines()
        .filter(|l| parse_class_header(l.trim_start()).is_some())
        .count();
    let function_count = names.len() - class_count;
    (class_count, function_count)
}

fn parse_class_header(trimmed: &str) -> Option<String> {
    let rest = trimmed.strip_prefix("class ")?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn parse_def_header(trimmed: &str) -> Option<String> {
    let rest = trimmed.strip_prefix("async def ").or_else(|| trimmed.strip_prefix("def "))?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// A target string that looks like a header rather than a bare name — `"def f()"`, `"class C:"`
/// — is almost certainly a copy-paste of the declaration instead of its name. Returns the
/// cleaned candidate name so the coordinator can offer a bounded auto-retry (§4.5).
pub fn detect_format_error(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let looks_malformed = trimmed.starts_with("class ")
        || trimmed.starts_with("def ")
        || trimmed.starts_with("async def ")
        || trimmed.contains('(')
        || trimmed.contains(':');
    if !looks_malformed {
        return None;
    }

    let mut cleaned = trimmed;
    for prefix in ["async def ", "def ", "class "] {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest;
            break;
        }
    }
    let cleaned = cleaned.split(['(', ':']).next().unwrap_or(cleaned).trim();
    if cleaned.is_empty() || cleaned == trimmed {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Resolve `name` (plain or `Class.member`) to a `ParserResult`. Tries a real syntactic parse
/// first; falls back to the line scanner if the file does not parse cleanly.
pub fn find_target(content: &str, name: &str) -> EngineResult<ParserResult> {
    if let Some(tree) = try_syntactic_parse(content) {
        if !tree.root_node().has_error() {
            if let Some(result) = find_via_tree(&tree, content, name) {
                return Ok(result);
            }
        }
    }
    find_via_line_scan(content, name).ok_or_else(|| target_missing(content, name))
}

fn target_missing(content: &str, name: &str) -> EngineError {
    let candidates = list_candidates(content);
    let (class_count, function_count) = candidate_counts(content);
    let mut similar: Vec<SimilarCandidate> = candidates
        .iter()
        .map(|c| SimilarCandidate {
            name: c.clone(),
            score: strsim::normalized_levenshtein(name, c),
        })
        .filter(|c| c.score >= 0.5)
        .collect();
    similar.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    EngineError::TargetMissing {
        requested: name.to_string(),
        similar,
        class_count,
        function_count,
    }
}

fn try_syntactic_parse(content: &str) -> Option<tree_sitter::Tree> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_python::LANGUAGE.into()).ok()?;
    parser.parse(content, None)
}

fn find_via_tree(tree: &tree_sitter::Tree, content: &str, name: &str) -> Option<ParserResult> {
    let (class_name, member) = crate::target_spec::split_dotted(name);
    let root = tree.root_node();
    let mut cursor = root.walk();

    for top in root.children(&mut cursor) {
        let node = unwrap_decorated(top);
        match class_name {
            None => {
                if node.kind() == "class_definition" || node.kind() == "function_definition" {
                    if node_name(node, content) == Some(member) {
                        return Some(build_result(top, node, content));
                    }
                }
            }
            Some(class_name) => {
                if node.kind() == "class_definition" && node_name(node, content) == Some(class_name)
                {
                    if let Some(body) = node.child_by_field_name("body") {
                        let mut body_cursor = body.walk();
                        for child in body.children(&mut body_cursor) {
                            let child_node = unwrap_decorated(child);
                            if child_node.kind() == "function_definition"
                                && node_name(child_node, content) == Some(member)
                            {
                                return Some(build_result(child, child_node, content));
                            }
                        }
                    }
                }
            }
        }
    }
    None
}

fn unwrap_decorated(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn node_name<'a>(node: Node, content: &'a str) -> Option<&'a str> {
    node.child_by_field_name("name")?.utf8_text(content.as_bytes()).ok()
}

fn build_result(outer: Node, inner: Node, content: &str) -> ParserResult {
    let start = outer.start_byte();
    let end = outer.end_byte();
    let line_ending = encoding::detect_line_ending(content.as_bytes());
    let start_line = content[..start].lines().count().saturating_sub(0);
    let lines: Vec<&str> = content.lines().collect();
    let header_line_idx = byte_offset_to_line(content, start);

    let line_text = lines.get(header_line_idx).copied().unwrap_or("");
    let indentation: String = line_text.chars().take_while(|c| *c == ' ' || *c == '\t').collect();

    let (after_decorators_idx, leading_comments) =
        collect_leading_comments(&lines, decorator_floor(&lines, header_line_idx), COMMENT_PREFIX);
    let _ = after_decorators_idx;
    let (_, decorators) = collect_decorators(&lines, header_line_idx);

    let end_line_idx = byte_offset_to_line(content, end);
    let (_, trailing_comments) = collect_trailing_comments(&lines, end_line_idx, COMMENT_PREFIX);

    let metadata = extract_metadata(inner, content);
    let _ = start_line;

    ParserResult {
        start,
        end,
        indentation,
        decorators,
        leading_comments,
        trailing_comments,
        line_ending,
        metadata,
    }
}

fn decorator_floor(lines: &[&str], header_line_idx: usize) -> usize {
    let (floor, _) = collect_decorators(lines, header_line_idx);
    floor
}

fn byte_offset_to_line(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count()
}

fn extract_metadata(node: Node, content: &str) -> TargetMetadata {
    let mut metadata = TargetMetadata::default();

    if node.kind() == "function_definition" {
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for child in params.children(&mut cursor) {
                if child.kind() == "identifier" {
                    if let Ok(text) = child.utf8_text(content.as_bytes()) {
                        if text != "self" && text != "cls" {
                            metadata.parameters.push(text.to_string());
                        }
                    }
                } else if child.kind() == "typed_parameter" || child.kind() == "default_parameter" {
                    if let Some(name_node) = child.child(0) {
                        if let Ok(text) = name_node.utf8_text(content.as_bytes()) {
                            if text != "self" && text != "cls" {
                                metadata.parameters.push(text.to_string());
                            }
                        }
                    }
                }
            }
        }
        if let Some(return_type) = node.child_by_field_name("return_type") {
            metadata.return_annotation =
                return_type.utf8_text(content.as_bytes()).ok().map(|s| s.to_string());
        }
        let body_text = node
            .child_by_field_name("body")
            .and_then(|b| b.utf8_text(content.as_bytes()).ok())
            .unwrap_or("");
        metadata.calls_super = body_text.contains("super(");
    }

    if node.kind() == "class_definition" {
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for child in superclasses.children(&mut cursor) {
                if child.kind() == "identifier" {
                    if let Ok(text) = child.utf8_text(content.as_bytes()) {
                        metadata.base_classes.push(text.to_string());
                    }
                }
            }
        }
    }

    metadata
}

/// Line-scanner fallback: recognizes `^\s*class Name[:(]` and `^\s*(async\s+)?def Name\s*\(`,
/// extending the block to the first subsequent non-blank line whose indentation is no deeper
/// than the header's.
fn find_via_line_scan(content: &str, name: &str) -> Option<ParserResult> {
    let (class_name, member) = crate::target_spec::split_dotted(name);
    let lines: Vec<&str> = content.lines().collect();

    match class_name {
        None => find_top_level(&lines, content, member),
        Some(class_name) => find_method(&lines, content, class_name, member),
    }
}

fn find_top_level(lines: &[&str], content: &str, name: &str) -> Option<ParserResult> {
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let indent_width = line.len() - trimmed.len();
        if indent_width != 0 {
            continue;
        }
        let matches_class = parse_class_header(trimmed).as_deref() == Some(name);
        let matches_def = parse_def_header(trimmed).as_deref() == Some(name);
        if matches_class || matches_def {
            return Some(finish_line_scan_result(lines, content, idx, 0));
        }
    }
    None
}

fn find_method(lines: &[&str], content: &str, class_name: &str, member: &str) -> Option<ParserResult> {
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        if line.len() - trimmed.len() != 0 {
            continue;
        }
        if parse_class_header(trimmed).as_deref() != Some(class_name) {
            continue;
        }
        let class_indent = 0;
        for (member_idx, member_line) in lines.iter().enumerate().skip(idx + 1) {
            let member_trimmed = member_line.trim_start();
            let member_indent = member_line.len() - member_trimmed.len();
            if !member_trimmed.is_empty() && member_indent <= class_indent {
                break; // left the class body
            }
            if parse_def_header(member_trimmed).as_deref() == Some(member) {
                return Some(finish_line_scan_result(lines, content, member_idx, member_indent));
            }
        }
    }
    None
}

fn finish_line_scan_result(
    lines: &[&str],
    content: &str,
    header_idx: usize,
    header_indent: usize,
) -> ParserResult {
    let mut end_idx = header_idx + 1;
    while end_idx < lines.len() {
        let line = lines[end_idx];
        let trimmed = line.trim_start();
        let indent_width = line.len() - trimmed.len();
        if !trimmed.is_empty() && indent_width <= header_indent {
            break;
        }
        end_idx += 1;
    }

    let (_, decorators) = collect_decorators(lines, header_idx);
    let (_, leading_comments) =
        collect_leading_comments(lines, decorator_floor(lines, header_idx), COMMENT_PREFIX);
    let (_, trailing_comments) = collect_trailing_comments(lines, end_idx, COMMENT_PREFIX);

    let start = line_index_to_byte_offset(content, header_idx);
    let end = if end_idx < lines.len() {
        line_index_to_byte_offset(content, end_idx)
    } else {
        content.len()
    };

    let header_line = lines[header_idx];
    let indentation: String =
        header_line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();

    ParserResult {
        start,
        end,
        indentation,
        decorators,
        leading_comments,
        trailing_comments,
        line_ending: encoding::detect_line_ending(content.as_bytes()),
        metadata: TargetMetadata::default(),
    }
}

fn line_index_to_byte_offset(content: &str, line_idx: usize) -> usize {
    let mut offset = 0;
    for (i, line) in content.split_inclusive('\n').enumerate() {
        if i == line_idx {
            return offset;
        }
        offset += line.len();
    }
    content.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "class Greeter:\n    def hello(self):\n        return 'hi'\n\n    def bye(self):\n        return 'bye'\n\n\ndef standalone():\n    pass\n";

    #[test]
    fn finds_top_level_function() {
        let result = find_target(SAMPLE, "standalone").unwrap();
        assert_eq!(result.block_text(SAMPLE).trim_end(), "def standalone():\n    pass");
    }

    #[test]
    fn finds_method_of_a_class() {
        let result = find_target(SAMPLE, "Greeter.hello").unwrap();
        assert!(result.block_text(SAMPLE).contains("return 'hi'"));
        assert!(!result.block_text(SAMPLE).contains("bye"));
    }

    #[test]
    fn missing_target_reports_similar_candidates() {
        let err = find_target(SAMPLE, "Greetr").unwrap_err();
        match err {
            EngineError::TargetMissing { similar, .. } => {
                assert!(similar.iter().any(|c| c.name == "Greeter"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decorator_is_attached_to_method() {
        let content = "class C:\n    @staticmethod\n    def f():\n        pass\n";
        let result = find_target(content, "C.f").unwrap();
        assert_eq!(result.decorators, vec!["    @staticmethod"]);
    }

    #[test]
    fn line_scanner_handles_malformed_file() {
        let broken = "def good():\n    return 1\n\ndef bad(:\n    oops\n";
        let result = find_target(broken, "good").unwrap();
        assert!(result.block_text(broken).contains("return 1"));
    }

    #[test]
    fn candidate_counts_split_classes_and_functions() {
        let (classes, functions) = candidate_counts(SAMPLE);
        assert_eq!(classes, 1);
        assert_eq!(functions, 3); // hello, bye, standalone
    }

    #[test]
    fn detects_def_header_pasted_as_a_target() {
        assert_eq!(detect_format_error("def f()"), Some("f".to_string()));
        assert_eq!(detect_format_error("class C:"), Some("C".to_string()));
        assert_eq!(detect_format_error("f"), None);
    }
}
