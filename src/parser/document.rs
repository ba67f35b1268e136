//! The document dialect: locating `\section{...}` and `\begin{env}...\end{env}` targets in
//! LaTeX-like source.
//!
//! Grounded directly on `flux_mcp/parsers/latex_parser.py`'s `_find_section_or_environment` /
//! `_find_environment` / `_list_available_sections`: a target is named either `"kind:Name"` (a
//! sectioning command or environment type plus its argument/label) or a bare environment name.
//! There is no syntactic parser for this dialect — sectioning commands and environment
//! delimiters are matched textually, same as the original.

use crate::encoding::{self};
use crate::error::{EngineError, EngineResult, SimilarCandidate};
use crate::parser::{ParserResult, TargetMetadata};

const SECTION_KINDS: &[&str] = &["section", "subsection", "subsubsection", "chapter", "paragraph"];

/// Resolve `"kind:name"` (a sectioning command) or a bare environment name to its byte range.
pub fn find_target(content: &str, spec: &str) -> EngineResult<ParserResult> {
    match spec.split_once(':') {
        Some((kind, name)) if SECTION_KINDS.contains(&kind) => find_section(content, kind, name),
        Some((kind, name)) => find_environment(content, kind, Some(name)),
        None => find_environment(content, spec, None),
    }
    .ok_or_else(|| target_missing(content, spec))
}

fn target_missing(content: &str, spec: &str) -> EngineError {
    let candidates = list_candidates(content);
    let mut similar: Vec<SimilarCandidate> = candidates
        .iter()
        .map(|c| SimilarCandidate {
            name: c.clone(),
            score: strsim::normalized_levenshtein(spec, c),
        })
        .filter(|c| c.score >= 0.5)
        .collect();
    similar.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    EngineError::TargetMissing {
        requested: spec.to_string(),
        similar,
        class_count: 0,
        function_count: candidates.len(),
    }
}

/// Every section argument and environment name/label mentioned in `content`, used for
/// `TargetMissing` suggestions.
pub fn list_candidates(content: &str) -> Vec<String> {
    let mut names = Vec::new();
    for kind in SECTION_KINDS {
        for arg in find_command_args(content, kind) {
            names.push(format!("{kind}:{arg}"));
        }
    }
    for (env, label) in find_environment_names(content) {
        match label {
            Some(label) => names.push(label),
            None => names.push(env),
        }
    }
    names
}

fn find_section(content: &str, kind: &str, name: &str) -> Option<ParserResult> {
    let marker = format!("\\{kind}{{{name}}}");
    let start = content.find(&marker)?;
    let end = next_section_boundary(content, start + marker.len(), kind);
    Some(wrap(content, start, end))
}

/// A section's block extends to the next command of the same or higher level, or EOF.
fn next_section_boundary(content: &str, from: usize, kind: &str) -> usize {
    let own_rank = SECTION_KINDS.iter().position(|k| *k == kind).unwrap_or(usize::MAX);
    let mut best = content.len();
    for candidate_kind in SECTION_KINDS.iter().take(own_rank + 1) {
        let marker = format!("\\{candidate_kind}{{");
        if let Some(pos) = content[from..].find(&marker) {
            best = best.min(from + pos);
        }
    }
    best
}

fn find_environment(content: &str, env: &str, label: Option<&str>) -> Option<ParserResult> {
    let begin_prefix = format!("\\begin{{{env}}}");
    let end_marker = format!("\\end{{{env}}}");

    let mut search_from = 0;
    loop {
        let begin_pos = content[search_from..].find(&begin_prefix)? + search_from;
        let after_begin = begin_pos + begin_prefix.len();
        let end_pos = content[after_begin..].find(&end_marker)? + after_begin + end_marker.len();
        let block = &content[begin_pos..end_pos];

        let matches_label = match label {
            None => true,
            Some(label) => block.contains(label),
        };
        if matches_label {
            return Some(wrap(content, begin_pos, end_pos));
        }
        search_from = after_begin;
    }
}

fn wrap(content: &str, start: usize, end: usize) -> ParserResult {
    let line_start = content[..start].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let indentation: String = content[line_start..start]
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();

    ParserResult {
        start,
        end,
        indentation,
        decorators: Vec::new(),
        leading_comments: Vec::new(),
        trailing_comments: Vec::new(),
        line_ending: encoding::detect_line_ending(content.as_bytes()),
        metadata: TargetMetadata::default(),
    }
}

fn find_command_args(content: &str, command: &str) -> Vec<String> {
    let prefix = format!("\\{command}{{");
    let mut args = Vec::new();
    let mut from = 0;
    while let Some(pos) = content[from..].find(&prefix) {
        let arg_start = from + pos + prefix.len();
        if let Some(close) = content[arg_start..].find('}') {
            args.push(content[arg_start..arg_start + close].to_string());
            from = arg_start + close + 1;
        } else {
            break;
        }
    }
    args
}

fn find_environment_names(content: &str) -> Vec<(String, Option<String>)> {
    let mut envs = Vec::new();
    let prefix = "\\begin{";
    let mut from = 0;
    while let Some(pos) = content[from..].find(prefix) {
        let name_start = from + pos + prefix.len();
        if let Some(close) = content[name_start..].find('}') {
            let env_name = content[name_start..name_start + close].to_string();
            let after = name_start + close + 1;
            let label = content[after..after.saturating_add(80).min(content.len())]
                .find("\\label{")
                .map(|label_pos| {
                    let label_start = after + label_pos + "\\label{".len();
                    let label_end = content[label_start..].find('}').unwrap_or(0);
                    content[label_start..label_start + label_end].to_string()
                });
            envs.push((env_name, label));
            from = after;
        } else {
            break;
        }
    }
    envs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\\section{Introduction}\nHello.\n\n\\section{Methods}\nWorld.\n\n\\begin{equation}\nE = mc^2\n\\end{equation}\n";

    #[test]
    fn finds_section_up_to_next_same_level_section() {
        let result = find_target(SAMPLE, "section:Introduction").unwrap();
        let text = result.block_text(SAMPLE);
        assert!(text.contains("Hello."));
        assert!(!text.contains("Methods"));
    }

    #[test]
    fn finds_bare_environment_by_name() {
        let result = find_target(SAMPLE, "equation").unwrap();
        assert!(result.block_text(SAMPLE).contains("E = mc^2"));
    }

    #[test]
    fn missing_target_reports_similar_candidates() {
        let err = find_target(SAMPLE, "section:Introdcution").unwrap_err();
        match err {
            EngineError::TargetMissing { similar, .. } => {
                assert!(similar.iter().any(|c| c.name.contains("Introduction")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
