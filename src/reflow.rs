//! Indentation reflow: re-align a replacement block's leading whitespace to the target's base
//! indentation before it is spliced into a file.
//!
//! Grounded on `tools/refactoring/indentation.rs`'s `detect_min_indentation` /
//! `normalize_indentation` / `apply_indentation` pipeline, generalized from "always spaces, fixed
//! width" into the tab/space-aware, violation-reporting version §4.6 calls for.

use crate::error::{EngineError, EngineResult, IndentationIssue};

const DEFAULT_TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndentKind {
    Spaces,
    Tabs,
}

/// Leading whitespace, decomposed into its kind and logical width (tabs counted individually,
/// spaces counted individually — mixing within one line's prefix is a violation, not something
/// this type normalizes away).
struct LeadingWhitespace {
    raw: String,
    kind: Option<IndentKind>,
    width: usize,
}

fn leading_whitespace(line: &str) -> LeadingWhitespace {
    let raw: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
    let has_space = raw.contains(' ');
    let has_tab = raw.contains('\t');
    let kind = match (has_space, has_tab) {
        (true, false) => Some(IndentKind::Spaces),
        (false, true) => Some(IndentKind::Tabs),
        (false, false) => None,
        (true, true) => None, // mixed; caller reports this as a violation
    };
    LeadingWhitespace {
        width: raw.chars().count(),
        raw,
        kind,
    }
}

fn render_whitespace(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\t' { '→' } else { '·' })
        .collect()
}

/// Detect the indentation prefix of the first nonblank line of `block`.
pub fn base_indentation(block: &str) -> String {
    for line in block.lines() {
        if !line.trim().is_empty() {
            return leading_whitespace(line).raw;
        }
    }
    String::new()
}

/// Check a replacement body against rules 2–3 of §4.6. Returns every violation found; an empty
/// result means the replacement is safe to reflow and splice.
pub fn check_violations(replacement: &str, indent_unit: usize) -> Vec<IndentationIssue> {
    let mut issues = Vec::new();
    let lines: Vec<&str> = replacement.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let lw = leading_whitespace(line);

        if lw.kind.is_none() && !lw.raw.is_empty() {
            issues.push(IndentationIssue {
                line_number: i + 1,
                offending_line: line.to_string(),
                rendered_whitespace: render_whitespace(&lw.raw),
                hint: "leading whitespace mixes tabs and spaces on one line".to_string(),
            });
            continue;
        }

        if lw.kind == Some(IndentKind::Spaces) && lw.width % indent_unit != 0 {
            issues.push(IndentationIssue {
                line_number: i + 1,
                offending_line: line.to_string(),
                rendered_whitespace: render_whitespace(&lw.raw),
                hint: format!(
                    "space indentation of {} is not a multiple of the indent unit ({})",
                    lw.width, indent_unit
                ),
            });
        }

        if line.trim_end().ends_with(':') {
            let next_nonblank = lines[i + 1..].iter().find(|l| !l.trim().is_empty());
            match next_nonblank {
                Some(next) => {
                    let next_width = leading_whitespace(next).width;
                    if next_width <= lw.width {
                        issues.push(IndentationIssue {
                            line_number: i + 1,
                            offending_line: line.to_string(),
                            rendered_whitespace: render_whitespace(&lw.raw),
                            hint: "block header is not followed by a more deeply indented line"
                                .to_string(),
                        });
                    }
                }
                None => issues.push(IndentationIssue {
                    line_number: i + 1,
                    offending_line: line.to_string(),
                    rendered_whitespace: render_whitespace(&lw.raw),
                    hint: "block header has no following body".to_string(),
                }),
            }
        }
    }

    issues
}

/// Re-indent `replacement` so it sits at `target_base_indent`'s depth, converting tabs/spaces to
/// match `target_kind_is_tabs` while preserving each line's logical depth. Call
/// `check_violations` first; this function assumes the input already passed that check.
pub fn reflow(
    replacement: &str,
    target_base_indent: &str,
    target_uses_tabs: bool,
    indent_unit: usize,
) -> String {
    let lines: Vec<&str> = replacement.lines().collect();
    if lines.len() <= 1 {
        return format!("{target_base_indent}{}", replacement.trim_start());
    }

    let replacement_base_width = lines
        .iter()
        .find(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l).width)
        .unwrap_or(0);

    let unit = indent_unit.max(1);
    let out: Vec<String> = lines
        .into_iter()
        .map(|line| {
            if line.trim().is_empty() {
                return String::new();
            }
            let lw = leading_whitespace(line);
            let depth = lw.width.saturating_sub(replacement_base_width) / unit;
            let unit_str = if target_uses_tabs {
                "\t".to_string()
            } else {
                " ".repeat(unit)
            };
            let indent = unit_str.repeat(depth);
            format!("{target_base_indent}{indent}{}", line.trim_start())
        })
        .collect();

    out.join("\n")
}

/// Run the full §4.6 pipeline: validate, then reflow. Returns the reflowed text or the
/// violations that block it.
pub fn apply(
    replacement: &str,
    target_block: &str,
    indent_unit: Option<usize>,
) -> EngineResult<String> {
    let unit = indent_unit.unwrap_or(DEFAULT_TAB_WIDTH);
    let issues = check_violations(replacement, unit);
    if !issues.is_empty() {
        return Err(EngineError::IndentationInvalid { issues });
    }

    let base_indent = base_indentation(target_block);
    let target_uses_tabs = base_indent.contains('\t');
    Ok(reflow(replacement, &base_indent, target_uses_tabs, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_indentation_reads_first_nonblank_line() {
        assert_eq!(base_indentation("\n    def f():\n        pass"), "    ");
    }

    #[test]
    fn mixed_tabs_and_spaces_is_a_violation() {
        let replacement = "def f():\n\t    pass";
        let issues = check_violations(replacement, 4);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].hint.contains("mixes tabs and spaces"));
    }

    #[test]
    fn non_multiple_space_indent_is_a_violation() {
        let replacement = "def f():\n   pass"; // 3 spaces, unit 4
        let issues = check_violations(replacement, 4);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].hint.contains("not a multiple"));
    }

    #[test]
    fn header_without_deeper_body_is_a_violation() {
        let replacement = "def f():\npass"; // same depth as header
        let issues = check_violations(replacement, 4);
        assert!(issues.iter().any(|i| i.hint.contains("more deeply indented")));
    }

    #[test]
    fn clean_block_has_no_violations() {
        let replacement = "def f():\n    return 1\n";
        assert!(check_violations(replacement, 4).is_empty());
    }

    #[test]
    fn reflow_shifts_block_to_target_base_indent() {
        let replacement = "def f():\n    return 1";
        let reflowed = reflow(replacement, "        ", false, 4);
        assert_eq!(reflowed, "        def f():\n            return 1");
    }

    #[test]
    fn reflow_preserves_blank_lines() {
        let replacement = "def f():\n\n    return 1";
        let reflowed = reflow(replacement, "    ", false, 4);
        assert_eq!(reflowed, "    def f():\n\n        return 1");
    }

    #[test]
    fn single_line_replacement_gets_base_indent_only() {
        let reflowed = reflow("return 1", "    ", false, 4);
        assert_eq!(reflowed, "    return 1");
    }

    #[test]
    fn apply_rejects_invalid_indentation_before_reflowing() {
        let err = apply("def f():\n   pass", "    def g():\n        pass", None).unwrap_err();
        assert!(matches!(err, EngineError::IndentationInvalid { .. }));
    }
}
