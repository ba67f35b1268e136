//! The target-specifier dialect: the tagged union `highlight` values arrive as, deserialized
//! straight off the wire by `serde`.
//!
//! Grounded on the shape of `rust-mcp-sdk` tool-input structs in `tools/safe_editing.rs`, which
//! likewise accept either a bare string or a small object for a field depending on call site;
//! here that polymorphism is total, covering every row of the target-specifier table.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Regex,
    Fuzzy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    /// `"Name"` or `"Name.member"` (plain or dotted string form).
    Name(String),
    /// `["Name", "Other.member"]` — first resolvable name wins.
    NameList(Vec<String>),
    Object(TargetObject),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetObject {
    pub target: Option<TargetValue>,
    pub pattern: Option<String>,
    pub line_range: Option<(usize, usize)>,
    pub block_start: Option<String>,
    pub block_end: Option<String>,
    pub match_type: Option<MatchType>,
    pub related_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Single(String),
    Many(Vec<String>),
}

/// A normalized view of a `TargetSpec`, used by the replace coordinator instead of matching on
/// the wire shape directly.
#[derive(Debug, Clone)]
pub enum ResolvedSpec {
    Names(Vec<String>),
    Pattern(String),
    LineRange(usize, usize),
    SubBlock {
        names: Vec<String>,
        block_start: String,
        block_end: String,
        match_type: MatchType,
    },
    RelatedFiles {
        names: Vec<String>,
        files: Vec<String>,
    },
}

impl TargetSpec {
    pub fn resolve(&self) -> ResolvedSpec {
        match self {
            TargetSpec::Name(name) => ResolvedSpec::Names(vec![name.clone()]),
            TargetSpec::NameList(names) => ResolvedSpec::Names(names.clone()),
            TargetSpec::Object(obj) => obj.resolve(),
        }
    }
}

impl TargetObject {
    fn names(&self) -> Vec<String> {
        match &self.target {
            Some(TargetValue::Single(n)) => vec![n.clone()],
            Some(TargetValue::Many(ns)) => ns.clone(),
            None => Vec::new(),
        }
    }

    fn resolve(&self) -> ResolvedSpec {
        if let Some(pattern) = &self.pattern {
            return ResolvedSpec::Pattern(pattern.clone());
        }
        if let Some((start, end)) = self.line_range {
            return ResolvedSpec::LineRange(start, end);
        }
        if let (Some(start), Some(end)) = (&self.block_start, &self.block_end) {
            return ResolvedSpec::SubBlock {
                names: self.names(),
                block_start: start.clone(),
                block_end: end.clone(),
                match_type: self.match_type.unwrap_or(MatchType::Exact),
            };
        }
        if let Some(files) = &self.related_files {
            return ResolvedSpec::RelatedFiles {
                names: self.names(),
                files: files.clone(),
            };
        }
        ResolvedSpec::Names(self.names())
    }
}

/// Split a possibly-dotted name into `(class, member)`. A plain name has no class part.
pub fn split_dotted(name: &str) -> (Option<&str>, &str) {
    match name.split_once('.') {
        Some((class, member)) => (Some(class), member),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_resolves_to_single_name() {
        let spec: TargetSpec = serde_json::from_str("\"Widget\"").unwrap();
        match spec.resolve() {
            ResolvedSpec::Names(names) => assert_eq!(names, vec!["Widget"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dotted_string_splits_into_class_and_member() {
        assert_eq!(split_dotted("Widget.render"), (Some("Widget"), "render"));
        assert_eq!(split_dotted("render"), (None, "render"));
    }

    #[test]
    fn name_list_tries_each_in_order() {
        let spec: TargetSpec = serde_json::from_str(r#"["A", "B.c"]"#).unwrap();
        match spec.resolve() {
            ResolvedSpec::Names(names) => assert_eq!(names, vec!["A", "B.c"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pattern_object_resolves_to_pattern() {
        let spec: TargetSpec = serde_json::from_str(r#"{"pattern": "foo\\d+"}"#).unwrap();
        match spec.resolve() {
            ResolvedSpec::Pattern(p) => assert_eq!(p, "foo\\d+"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn line_range_object_resolves_to_line_range() {
        let spec: TargetSpec = serde_json::from_str(r#"{"line_range": [3, 9]}"#).unwrap();
        match spec.resolve() {
            ResolvedSpec::LineRange(3, 9) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn related_files_object_carries_names_and_files() {
        let spec: TargetSpec = serde_json::from_str(
            r#"{"target": "Widget", "related_files": ["a.py", "b.py"]}"#,
        )
        .unwrap();
        match spec.resolve() {
            ResolvedSpec::RelatedFiles { names, files } => {
                assert_eq!(names, vec!["Widget"]);
                assert_eq!(files, vec!["a.py", "b.py"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sub_block_object_carries_match_type() {
        let spec: TargetSpec = serde_json::from_str(
            r#"{"target": "Widget", "block_start": "def a", "block_end": "def b", "match_type": "fuzzy"}"#,
        )
        .unwrap();
        match spec.resolve() {
            ResolvedSpec::SubBlock { match_type, .. } => assert_eq!(match_type, MatchType::Fuzzy),
            other => panic!("unexpected {other:?}"),
        }
    }
}
