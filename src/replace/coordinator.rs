//! State machine implementation for a single `text_replace` call.
//!
//! Grounded on `tools/safe_editing.rs`'s `SafeEditTool`: resolve the mode, validate, compute a
//! diff, stage through a transaction, and return one result document — generalized here from a
//! fixed set of edit modes into the full target-specifier dialect and a real transaction manager
//! instead of `EditingTransaction` used directly inline.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::ByteCache;
use crate::checkpoint::CheckpointStore;
use crate::config::EngineConfig;
use crate::diff;
use crate::encoding;
use crate::error::{EngineError, EngineResult};
use crate::mapped_store::MappedFileStore;
use crate::parser::{self, Dialect, ParserResult};
use crate::reflow;
use crate::target_spec::{MatchType, ResolvedSpec, TargetSpec};
use crate::transaction::TransactionManager;
use crate::validate;

#[derive(Debug, Clone, Default)]
pub struct ReplaceOptions {
    pub checkpoint: Option<String>,
    pub auto_checkpoint: bool,
    pub dry_run: bool,
    pub batch_mode: bool,
    pub process_imports: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ReplaceOutcome {
    pub success: bool,
    pub message: String,
    pub diff_output: String,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub modified_files: Vec<String>,
    pub similar_targets: Vec<String>,
    pub successful_targets: Vec<String>,
    pub failed_targets: Vec<String>,
    pub fuzzy_recovery: bool,
    /// Set when `highlight` looked like a pasted declaration (`"def f()"`) rather than a bare
    /// name and was cleaned to `original_highlight` before resolving (§4.5's format-error
    /// auto-retry).
    pub auto_fixed: bool,
    pub original_highlight: Option<String>,
    pub new_content: Option<String>,
    pub encoding: Option<String>,
    pub line_ending: Option<String>,
}

/// What splicing a resolved target produced, plus the bookkeeping the top-level result document
/// reports back to the caller.
struct SpliceOutcome {
    content: String,
    fuzzy_recovery: bool,
    auto_fixed: bool,
    original_highlight: Option<String>,
    similar_targets: Vec<String>,
    successful: Vec<String>,
    failed: Vec<String>,
    warnings: Vec<String>,
}

impl SpliceOutcome {
    fn simple(content: String, successful: Vec<String>) -> Self {
        Self {
            content,
            fuzzy_recovery: false,
            auto_fixed: false,
            original_highlight: None,
            similar_targets: vec![],
            successful,
            failed: vec![],
            warnings: vec![],
        }
    }
}

pub struct ReplaceCoordinator {
    transactions: Arc<TransactionManager>,
    store: Arc<MappedFileStore>,
    cache: Arc<ByteCache>,
    checkpoints: Option<Arc<CheckpointStore>>,
    config: EngineConfig,
}

impl ReplaceCoordinator {
    pub fn new(
        transactions: Arc<TransactionManager>,
        store: Arc<MappedFileStore>,
        cache: Arc<ByteCache>,
        checkpoints: Option<Arc<CheckpointStore>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transactions,
            store,
            cache,
            checkpoints,
            config,
        }
    }

    /// Entry point for a single `text_replace` call. A `related_files` target is a sequence of
    /// independent per-file transactions (§4.8): the primary path and every sibling in `files`
    /// are each run through [`Self::replace_single_file`] with the same resolved names, and the
    /// per-file result documents are aggregated into one.
    pub async fn replace(
        &self,
        path: &Path,
        highlight: &TargetSpec,
        replace_with: &str,
        opts: &ReplaceOptions,
    ) -> EngineResult<ReplaceOutcome> {
        if let ResolvedSpec::RelatedFiles { names, files } = highlight.resolve() {
            return self.replace_related_files(path, &names, &files, replace_with, opts).await;
        }
        self.replace_single_file(path, highlight, replace_with, opts).await
    }

    async fn replace_related_files(
        &self,
        primary: &Path,
        names: &[String],
        files: &[String],
        replace_with: &str,
        opts: &ReplaceOptions,
    ) -> EngineResult<ReplaceOutcome> {
        let inner_spec = TargetSpec::NameList(names.to_vec());
        let mut paths: Vec<&Path> = vec![primary];
        paths.extend(files.iter().map(Path::new));

        let mut aggregate = ReplaceOutcome {
            success: false,
            ..Default::default()
        };
        for path in paths {
            let path_str = path.to_string_lossy().to_string();
            let outcome = self.replace_single_file(path, &inner_spec, replace_with, opts).await?;
            aggregate.success |= outcome.success;
            aggregate.modified_files.extend(outcome.modified_files);
            if !outcome.diff_output.is_empty() {
                if !aggregate.diff_output.is_empty() {
                    aggregate.diff_output.push('\n');
                }
                aggregate.diff_output.push_str(&outcome.diff_output);
            }
            aggregate.warnings.extend(outcome.warnings);
            aggregate.errors.extend(outcome.errors.into_iter().map(|e| format!("{path_str}: {e}")));
            aggregate.similar_targets.extend(outcome.similar_targets);
            aggregate
                .successful_targets
                .extend(outcome.successful_targets.into_iter().map(|t| format!("{path_str}: {t}")));
            aggregate
                .failed_targets
                .extend(outcome.failed_targets.into_iter().map(|t| format!("{path_str}: {t}")));
            aggregate.fuzzy_recovery |= outcome.fuzzy_recovery;
            aggregate.auto_fixed |= outcome.auto_fixed;
        }

        aggregate.message = if aggregate.success {
            format!("replace committed across {} file(s)", aggregate.modified_files.len())
        } else {
            "no target resolved in primary file or any related file".to_string()
        };
        Ok(aggregate)
    }

    async fn replace_single_file(
        &self,
        path: &Path,
        highlight: &TargetSpec,
        replace_with: &str,
        opts: &ReplaceOptions,
    ) -> EngineResult<ReplaceOutcome> {
        let path_str = path.to_string_lossy().to_string();
        debug!(path = %path_str, "replace received");

        // received -> resolved
        let original_bytes = self.store.read_whole(path, None).await.map(|s| s.into_bytes());
        let original_bytes = match original_bytes {
            Ok(bytes) => bytes,
            Err(e) => return Ok(Self::error_outcome(format!("{e}"))),
        };
        let encoding = encoding::detect_encoding(&original_bytes);
        let content = encoding::decode_lossy(&original_bytes, encoding);
        let line_ending = encoding::detect_line_ending(&original_bytes);
        let normalized_replacement = encoding::normalize_line_endings(replace_with, line_ending);

        let resolved = highlight.resolve();
        let dialect = Dialect::from_extension(&path_str).unwrap_or(Dialect::Code);

        let splice = match self.resolve_and_splice(
            &content,
            &resolved,
            highlight,
            &normalized_replacement,
            dialect,
            opts.batch_mode,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                let mut outcome = Self::error_outcome(format!("{e}"));
                if let EngineError::TargetMissing { similar, .. } = &e {
                    outcome.similar_targets = similar.iter().map(|c| c.name.clone()).collect();
                }
                return Ok(outcome);
            }
        };
        let SpliceOutcome {
            content: spliced,
            fuzzy_recovery,
            auto_fixed,
            original_highlight,
            similar_targets,
            successful,
            failed,
            warnings,
        } = splice;

        if successful.is_empty() {
            let mut outcome = Self::error_outcome("no target resolved".to_string());
            outcome.similar_targets = similar_targets;
            outcome.failed_targets = failed;
            return Ok(outcome);
        }

        // reflowed -> validated (whole-file check; isolated checks already ran per-target)
        if dialect == Dialect::Code {
            if let Err(e) = validate::check_whole_file(&spliced) {
                warn!(path = %path_str, "whole-file validation failed, aborting");
                return Ok(Self::error_outcome(format!("{e}")));
            }
        }

        let diff_output = diff::unified_diff(&path_str, &content, &spliced);

        if opts.dry_run {
            return Ok(ReplaceOutcome {
                success: true,
                message: "dry run: no changes written".to_string(),
                diff_output,
                warnings,
                fuzzy_recovery,
                auto_fixed,
                original_highlight: original_highlight.clone(),
                similar_targets,
                successful_targets: successful,
                failed_targets: failed,
                new_content: Some(spliced),
                encoding: Some(encoding.as_str().to_string()),
                line_ending: Some(line_ending.as_str().to_string()),
                ..Default::default()
            });
        }

        // validated -> staged -> committed
        let txn_id = self.transactions.begin();
        self.transactions.acquire(&txn_id, path)?;

        if opts.auto_checkpoint || opts.checkpoint.is_some() {
            if let Some(store) = &self.checkpoints {
                let name = opts.checkpoint.clone().unwrap_or_else(|| "auto".to_string());
                let captured_at = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                store.create_checkpoint(&txn_id, &path_str, &name, &original_bytes, captured_at)?;
            }
        }

        let new_bytes = encoding::encode_lossy(&spliced, encoding);
        if let Err(e) = self.transactions.stage(&txn_id, path, &new_bytes) {
            self.transactions.rollback(&txn_id)?;
            self.transactions.forget(&txn_id);
            return Ok(Self::error_outcome(format!("{e}")));
        }

        self.transactions.commit(&txn_id)?;
        self.transactions.forget(&txn_id);
        self.cache.invalidate_path(&path_str);
        self.store.release(path);
        info!(path = %path_str, transaction = %txn_id, "replace committed");

        Ok(ReplaceOutcome {
            success: true,
            message: "replace committed".to_string(),
            diff_output,
            warnings,
            modified_files: vec![path_str],
            fuzzy_recovery,
            auto_fixed,
            original_highlight,
            similar_targets,
            successful_targets: successful,
            failed_targets: failed,
            new_content: Some(spliced),
            encoding: Some(encoding.as_str().to_string()),
            line_ending: Some(line_ending.as_str().to_string()),
            ..Default::default()
        })
    }

    /// Resolve `resolved` against `content`, splicing in `replacement` wherever it applies.
    /// Returns the new content plus bookkeeping about which named targets succeeded.
    fn resolve_and_splice(
        &self,
        content: &str,
        resolved: &ResolvedSpec,
        original_spec: &TargetSpec,
        replacement: &str,
        dialect: Dialect,
        batch_mode: bool,
    ) -> EngineResult<SpliceOutcome> {
        match resolved {
            ResolvedSpec::Names(names) => {
                self.splice_names(content, names, original_spec, replacement, dialect, batch_mode)
            }
            ResolvedSpec::Pattern(pattern) => {
                let new_content = self.splice_pattern(content, pattern, replacement)?;
                Ok(SpliceOutcome::simple(new_content, vec![pattern.clone()]))
            }
            ResolvedSpec::LineRange(start, end) => {
                let new_content = splice_line_range(content, *start, *end, replacement);
                Ok(SpliceOutcome::simple(new_content, vec![format!("{start}:{end}")]))
            }
            ResolvedSpec::SubBlock {
                names,
                block_start,
                block_end,
                match_type,
            } => {
                let target = names.first().cloned().unwrap_or_default();
                let parsed = self.find_in_dialect(content, &target, dialect)?;
                let block_text = parsed.block_text(content);
                let new_block =
                    narrow_sub_block(block_text, block_start, block_end, replacement, *match_type)?;
                let new_content =
                    format!("{}{}{}", &content[..parsed.start], new_block, &content[parsed.end..]);
                Ok(SpliceOutcome::simple(new_content, vec![target]))
            }
            ResolvedSpec::RelatedFiles { names, .. } => {
                // Only the primary file's own splice; `replace` fans the same names out over
                // `files` as independent per-file calls once this one has committed.
                self.splice_names(content, names, original_spec, replacement, dialect, batch_mode)
            }
        }
    }

    fn splice_names(
        &self,
        content: &str,
        names: &[String],
        original_spec: &TargetSpec,
        replacement: &str,
        dialect: Dialect,
        batch_mode: bool,
    ) -> EngineResult<SpliceOutcome> {
        if batch_mode {
            return self.splice_names_batch(content, names, replacement, dialect);
        }

        let mut last_err = None;
        for name in names {
            match self.find_in_dialect(content, name, dialect) {
                Ok(parsed) => {
                    let (new_content, warnings) =
                        self.splice_one(content, &parsed, name, replacement, dialect)?;
                    let mut outcome = SpliceOutcome::simple(new_content, vec![name.clone()]);
                    outcome.warnings = warnings;
                    return Ok(outcome);
                }
                Err(e) => last_err = Some(e),
            }
        }

        // Format-error auto-recovery (§4.5): a single plain name that looks like a pasted
        // declaration (`"def f()"`) gets cleaned and retried once before falling through to
        // fuzzy recovery or failure.
        if let (TargetSpec::Name(raw), Some(_), Dialect::Code) =
            (original_spec, names.first(), dialect)
        {
            if crate::config::MAX_AUTO_RETRIES > 0 {
                if let Some(cleaned) = parser::code::detect_format_error(raw) {
                    if let Ok(parsed) = self.find_in_dialect(content, &cleaned, dialect) {
                        let (new_content, warnings) =
                            self.splice_one(content, &parsed, &cleaned, replacement, dialect)?;
                        let mut outcome = SpliceOutcome::simple(new_content, vec![cleaned]);
                        outcome.auto_fixed = true;
                        outcome.original_highlight = Some(raw.clone());
                        outcome.warnings = warnings;
                        return Ok(outcome);
                    }
                }
            }
        }

        // Fuzzy recovery only applies to a single plain, undotted name (§4.8).
        if let (TargetSpec::Name(raw), Some(name)) = (original_spec, names.first()) {
            if !raw.contains('.') {
                let candidates = match dialect {
                    Dialect::Code => parser::code::list_candidates(content),
                    Dialect::Document => parser::document::list_candidates(content),
                };
                let ranked = parser::fuzzy::rank(name, &candidates);
                if let Some(best) =
                    parser::fuzzy::best_match_clears(&ranked, self.config.fuzzy_threshold)
                {
                    if let Ok(parsed) = self.find_in_dialect(content, &best.name, dialect) {
                        let (new_content, warnings) =
                            self.splice_one(content, &parsed, &best.name, replacement, dialect)?;
                        let similar: Vec<String> = ranked.iter().map(|c| c.name.clone()).collect();
                        let mut outcome = SpliceOutcome::simple(new_content, vec![best.name.clone()]);
                        outcome.fuzzy_recovery = true;
                        outcome.similar_targets = similar;
                        outcome.warnings = warnings;
                        return Ok(outcome);
                    }
                }
                return Err(last_err.unwrap_or(EngineError::TargetMissing {
                    requested: raw.clone(),
                    similar: ranked,
                    class_count: 0,
                    function_count: candidates.len(),
                }));
            }
        }

        Err(last_err.unwrap_or_else(|| EngineError::TargetMissing {
            requested: names.join(", "),
            similar: vec![],
            class_count: 0,
            function_count: 0,
        }))
    }

    /// §4.8 multi-target apply-all: every name is attempted in declaration order against the
    /// bytes left by the previous iteration, a per-target failure is recorded rather than
    /// aborting the whole call, and the transaction commits iff at least one target succeeded.
    fn splice_names_batch(
        &self,
        content: &str,
        names: &[String],
        replacement: &str,
        dialect: Dialect,
    ) -> EngineResult<SpliceOutcome> {
        let mut current = content.to_string();
        let mut successful = Vec::new();
        let mut failed = Vec::new();
        let mut warnings = Vec::new();

        for name in names {
            match self.find_in_dialect(&current, name, dialect) {
                Ok(parsed) => match self.splice_one(&current, &parsed, name, replacement, dialect) {
                    Ok((new_content, target_warnings)) => {
                        current = new_content;
                        successful.push(name.clone());
                        warnings.extend(target_warnings);
                    }
                    Err(e) => failed.push(format!("{name}: {e}")),
                },
                Err(e) => failed.push(format!("{name}: {e}")),
            }
        }

        if successful.is_empty() {
            return Err(EngineError::TargetMissing {
                requested: names.join(", "),
                similar: vec![],
                class_count: 0,
                function_count: 0,
            });
        }

        let mut outcome = SpliceOutcome::simple(current, successful);
        outcome.failed = failed;
        outcome.warnings = warnings;
        Ok(outcome)
    }

    fn find_in_dialect(&self, content: &str, name: &str, dialect: Dialect) -> EngineResult<ParserResult> {
        match dialect {
            Dialect::Code => parser::code::find_target(content, name),
            Dialect::Document => parser::document::find_target(content, name),
        }
    }

    /// Splices `replacement` into the block `parsed` describes, running the isolated syntax
    /// check and (code dialect only) the §4.7 signature/class compatibility check against the
    /// replacement's own re-parsed metadata. Returns the spliced content plus any non-critical
    /// compatibility warnings; a critical incompatibility aborts the splice when
    /// `abort_on_critical_incompatibility` is set.
    fn splice_one(
        &self,
        content: &str,
        parsed: &ParserResult,
        name: &str,
        replacement: &str,
        dialect: Dialect,
    ) -> EngineResult<(String, Vec<String>)> {
        let (_, member) = crate::target_spec::split_dotted(name);
        let mut warnings = Vec::new();

        if dialect == Dialect::Code {
            if name.contains('.') {
                let trimmed = replacement.trim_start();
                let expected_defs = [format!("def {member}"), format!("async def {member}")];
                if !expected_defs.iter().any(|d| trimmed.starts_with(d.as_str())) {
                    return Err(EngineError::TypeIncompatible(format!(
                        "replacement for '{name}' must begin with 'def {member}' or 'async def {member}'"
                    )));
                }
            }
            validate::check_isolated(replacement)?;

            if let Ok(replacement_parsed) = self.find_in_dialect(replacement, member, dialect) {
                let is_class = parsed.block_text(content).trim_start().starts_with("class ");
                let compat = if is_class {
                    validate::check_class_compatibility(&parsed.metadata, &replacement_parsed.metadata)
                } else {
                    validate::check_signature_compatibility(&parsed.metadata, &replacement_parsed.metadata)
                };
                if compat.critical && self.config.abort_on_critical_incompatibility {
                    return Err(EngineError::TypeIncompatible(compat.messages.join("; ")));
                }
                warnings = compat.messages;
            }
        }

        let block_text = parsed.block_text(content);
        let reflowed = reflow::apply(replacement, block_text, None)?;

        let mut spliced = reflowed;
        if !parsed.decorators.is_empty() && dialect == Dialect::Code {
            let decorator_text = parsed.decorators.join("\n");
            spliced = format!("{decorator_text}\n{spliced}");
        }

        Ok((format!("{}{}{}", &content[..parsed.start], spliced, &content[parsed.end..]), warnings))
    }

    fn splice_pattern(&self, content: &str, pattern: &str, replacement: &str) -> EngineResult<String> {
        let regex = Regex::new(pattern)?;
        let matches: Vec<_> = regex.find_iter(content).collect();
        let mut out = content.to_string();
        // Right-to-left so earlier byte offsets stay valid as later ones are rewritten.
        for m in matches.into_iter().rev() {
            out.replace_range(m.start()..m.end(), replacement);
        }
        Ok(out)
    }

    fn error_outcome(message: String) -> ReplaceOutcome {
        ReplaceOutcome {
            success: false,
            errors: vec![message.clone()],
            message,
            ..Default::default()
        }
    }
}

fn splice_line_range(content: &str, start: usize, end: usize, replacement: &str) -> String {
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let s = start.min(lines.len().saturating_sub(1));
    let e = end.min(lines.len().saturating_sub(1));
    let before: String = lines[..s].concat();
    let after: String = if e + 1 < lines.len() { lines[e + 1..].concat() } else { String::new() };
    format!("{before}{replacement}{after}")
}

/// Find the byte range `marker` delimits within `block`, starting the search at `from`. `Exact`
/// is a literal substring search; `Regex` compiles `marker` as a pattern; `Fuzzy` picks whichever
/// line scores highest against `marker` under `strsim::normalized_levenshtein`, requiring at
/// least the same 0.5 floor `parser::fuzzy` uses for listing candidates.
fn locate_marker(block: &str, marker: &str, from: usize, match_type: MatchType) -> Option<(usize, usize)> {
    let haystack = &block[from..];
    match match_type {
        MatchType::Exact => haystack.find(marker).map(|s| (from + s, from + s + marker.len())),
        MatchType::Regex => {
            let regex = Regex::new(marker).ok()?;
            regex.find(haystack).map(|m| (from + m.start(), from + m.end()))
        }
        MatchType::Fuzzy => {
            let mut best: Option<(usize, usize, f64)> = None;
            let mut offset = from;
            for line in haystack.split_inclusive('\n') {
                let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
                let score = strsim::normalized_levenshtein(marker, trimmed);
                if best.as_ref().map(|(_, _, b)| score > *b).unwrap_or(true) {
                    best = Some((offset, offset + trimmed.len(), score));
                }
                offset += line.len();
            }
            best.filter(|(_, _, score)| *score >= 0.5).map(|(s, e, _)| (s, e))
        }
    }
}

fn narrow_sub_block(
    block: &str,
    block_start: &str,
    block_end: &str,
    replacement: &str,
    match_type: MatchType,
) -> EngineResult<String> {
    let (start, after_start) =
        locate_marker(block, block_start, 0, match_type).ok_or_else(|| EngineError::FormatError {
            reason: format!("block_start '{block_start}' not found"),
            cleaned_candidate: block_start.to_string(),
        })?;
    let (_, end) =
        locate_marker(block, block_end, after_start, match_type).ok_or_else(|| EngineError::FormatError {
            reason: format!("block_end '{block_end}' not found"),
            cleaned_candidate: block_end.to_string(),
        })?;
    Ok(format!("{}{}{}", &block[..start], replacement, &block[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::BlockingPool;
    use std::fs;

    fn coordinator() -> (ReplaceCoordinator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = BlockingPool::new(2);
        let coordinator = ReplaceCoordinator::new(
            Arc::new(TransactionManager::new()),
            crate::mapped_store::new_store(pool),
            Arc::new(ByteCache::new(1024 * 1024)),
            None,
            EngineConfig::default(),
        );
        (coordinator, dir)
    }

    #[tokio::test]
    async fn replaces_a_top_level_function() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(&path, "def f():\n    return 1\n").unwrap();

        let outcome = coordinator
            .replace(
                &path,
                &TargetSpec::Name("f".to_string()),
                "def f():\n    return 2\n",
                &ReplaceOptions::default(),
            )
            .await
            .unwrap();

        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(fs::read_to_string(&path).unwrap(), "def f():\n    return 2\n");
    }

    #[tokio::test]
    async fn dry_run_leaves_file_untouched() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(&path, "def f():\n    return 1\n").unwrap();

        let opts = ReplaceOptions {
            dry_run: true,
            ..Default::default()
        };
        let outcome = coordinator
            .replace(&path, &TargetSpec::Name("f".to_string()), "def f():\n    return 2\n", &opts)
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(fs::read_to_string(&path).unwrap(), "def f():\n    return 1\n");
        assert!(outcome.diff_output.contains("-    return 1"));
    }

    #[tokio::test]
    async fn missing_target_reports_failure_with_similar_names() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(&path, "def greet():\n    return 1\n").unwrap();

        let outcome = coordinator
            .replace(
                &path,
                &TargetSpec::Name("greett".to_string()),
                "def greett():\n    return 2\n",
                &ReplaceOptions::default(),
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(outcome.similar_targets.iter().any(|n| n == "greet"));
    }

    #[tokio::test]
    async fn format_error_highlight_auto_recovers() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(&path, "def f():\n    return 1\n").unwrap();

        let outcome = coordinator
            .replace(
                &path,
                &TargetSpec::Name("def f()".to_string()),
                "def f():\n    return 2\n",
                &ReplaceOptions::default(),
            )
            .await
            .unwrap();

        assert!(outcome.success, "{:?}", outcome.errors);
        assert!(outcome.auto_fixed);
        assert_eq!(outcome.original_highlight, Some("def f()".to_string()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "def f():\n    return 2\n");
    }

    #[tokio::test]
    async fn sub_block_narrows_with_regex_match_type() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(
            &path,
            "class Widget:\n    def setup(self):\n        pass\n\n    def teardown(self):\n        pass\n",
        )
        .unwrap();

        let spec: TargetSpec = serde_json::from_str(
            r#"{"target": "Widget", "block_start": "def setup.*", "block_end": "pass", "match_type": "regex"}"#,
        )
        .unwrap();
        let outcome = coordinator
            .replace(&path, &spec, "def setup(self):\n        return None", &ReplaceOptions::default())
            .await
            .unwrap();

        assert!(outcome.success, "{:?}", outcome.errors);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("def setup(self):\n        return None"));
        assert!(written.contains("def teardown(self):\n        pass"));
    }

    #[tokio::test]
    async fn pattern_target_replaces_every_match() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(&path, "x = 1\ny = 1\n").unwrap();

        let spec: TargetSpec = serde_json::from_str(r#"{"pattern": "= 1"}"#).unwrap();
        let outcome = coordinator
            .replace(&path, &spec, "= 2", &ReplaceOptions::default())
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x = 2\ny = 2\n");
    }

    #[tokio::test]
    async fn related_files_applies_to_primary_and_siblings() {
        let (coordinator, dir) = coordinator();
        let primary = dir.path().join("a.py");
        let sibling = dir.path().join("b.py");
        fs::write(&primary, "def f():\n    return 1\n").unwrap();
        fs::write(&sibling, "def f():\n    return 1\n").unwrap();

        let spec: TargetSpec = serde_json::from_str(
            &format!(r#"{{"target": "f", "related_files": [{:?}]}}"#, sibling.to_string_lossy()),
        )
        .unwrap();
        let outcome = coordinator
            .replace(&primary, &spec, "def f():\n    return 2\n", &ReplaceOptions::default())
            .await
            .unwrap();

        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(outcome.modified_files.len(), 2);
        assert_eq!(fs::read_to_string(&primary).unwrap(), "def f():\n    return 2\n");
        assert_eq!(fs::read_to_string(&sibling).unwrap(), "def f():\n    return 2\n");
    }

    #[tokio::test]
    async fn batch_mode_applies_every_target_and_records_failures() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(&path, "def f():\n    return 1\n\ndef g():\n    return 1\n").unwrap();

        let opts = ReplaceOptions {
            batch_mode: true,
            ..Default::default()
        };
        let outcome = coordinator
            .replace(
                &path,
                &TargetSpec::NameList(vec!["f".to_string(), "missing".to_string()]),
                "def f():\n    return 2\n",
                &opts,
            )
            .await
            .unwrap();

        assert!(outcome.success, "{:?}", outcome.errors);
        assert_eq!(outcome.successful_targets, vec!["f".to_string()]);
        assert_eq!(outcome.failed_targets.len(), 1);
        assert!(outcome.failed_targets[0].starts_with("missing:"));
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("def f():\n    return 2\n"));
        assert!(written.contains("def g():\n    return 1\n"));
    }

    #[tokio::test]
    async fn removed_parameter_is_reported_as_critical_warning() {
        let (coordinator, dir) = coordinator();
        let path = dir.path().join("m.py");
        fs::write(&path, "class Calculator:\n    def add(self, a, b):\n        return a + b\n").unwrap();

        let outcome = coordinator
            .replace(
                &path,
                &TargetSpec::Name("Calculator.add".to_string()),
                "def add(self, a):\n    return a\n",
                &ReplaceOptions::default(),
            )
            .await
            .unwrap();

        assert!(!outcome.success);
        assert!(!outcome.errors.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "class Calculator:\n    def add(self, a, b):\n        return a + b\n");
    }
}

