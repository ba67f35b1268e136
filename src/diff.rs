//! Unified diff generation for the replace coordinator's response document.
//!
//! Uses `similar`'s line-level `TextDiff`, formatted with the standard three-line context window
//! so the output round-trips through any ordinary unified-diff patcher (§8, Testable Property 9).

use similar::{ChangeTag, TextDiff};

const CONTEXT_LINES: usize = 3;

/// Produce a unified diff of `before` against `after`, labelling hunks with `path`.
pub fn unified_diff(path: &str, before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    diff.unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

/// True if `before` and `after` differ at all, without paying for full diff formatting.
pub fn has_changes(before: &str, after: &str) -> bool {
    before != after
}

/// Count inserted and deleted lines, for the response document's summary counters.
pub fn change_counts(before: &str, after: &str) -> (usize, usize) {
    let diff = TextDiff::from_lines(before, after);
    let mut inserted = 0;
    let mut deleted = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => inserted += 1,
            ChangeTag::Delete => deleted += 1,
            ChangeTag::Equal => {}
        }
    }
    (inserted, deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_diff_contains_both_labels() {
        let out = unified_diff("a.py", "x\ny\nz\n", "x\nY\nz\n");
        assert!(out.contains("a/a.py"));
        assert!(out.contains("b/a.py"));
        assert!(out.contains("-y"));
        assert!(out.contains("+Y"));
    }

    #[test]
    fn no_changes_yields_no_diff_lines() {
        let out = unified_diff("a.py", "same\n", "same\n");
        assert!(!out.contains("@@"));
    }

    #[test]
    fn change_counts_reports_one_insert_one_delete_for_a_line_swap() {
        let (ins, del) = change_counts("x\ny\nz\n", "x\nY\nz\n");
        assert_eq!((ins, del), (1, 1));
    }

    #[test]
    fn has_changes_detects_identical_content() {
        assert!(!has_changes("same", "same"));
        assert!(has_changes("same", "different"));
    }
}
