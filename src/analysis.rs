use std::{
   path::{Path, PathBuf},
   sync::{
      Arc,
      atomic::{AtomicBool, Ordering},
   },
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
   error::{AnalyzerError, Result},
   git::{ChangeSource, GitRunner},
   metrics::collect_metrics,
   patterns::{PatternGroups, group_files},
   relationships::{DirectoryRelationships, analyze_relationships},
   status::{ChangeRecord, file_extension, parse_status},
   tree::{DEFAULT_MAX_DEPTH, DirectoryNode, ExcludeRules, build_tree},
};

/// `extension_counts` key for files without an extension
pub const NO_EXTENSION_SUMMARY: &str = "(none)";

/// Default size of the per-file metrics worker pool
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Per-call analysis parameters
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
   /// Keep only the first N changes in listing order; `None` or 0 keeps all
   pub max_files:        Option<usize>,
   pub max_depth:        usize,
   /// Globs matched against repository-relative paths during the tree walk
   pub exclude_patterns: Vec<String>,
   /// Worker threads for per-file metrics
   pub concurrency:      usize,
   /// Raised by the caller to abandon the analysis
   pub cancel:           Option<Arc<AtomicBool>>,
}

impl Default for AnalysisOptions {
   fn default() -> Self {
      Self {
         max_files:        None,
         max_depth:        DEFAULT_MAX_DEPTH,
         exclude_patterns: Vec::new(),
         concurrency:      DEFAULT_CONCURRENCY,
         cancel:           None,
      }
   }
}

impl AnalysisOptions {
   /// Reject values the engine cannot honour
   pub fn validate(&self) -> Result<()> {
      if self.max_depth == 0 {
         return Err(AnalyzerError::InvalidOption {
            name:   "max_depth",
            reason: "must be a positive integer".to_string(),
         });
      }
      Ok(())
   }

   fn is_cancelled(&self) -> bool {
      self
         .cancel
         .as_ref()
         .is_some_and(|flag| flag.load(Ordering::Relaxed))
   }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorySummary {
   pub path:               String,
   pub file_count:         usize,
   pub total_line_changes: usize,
   pub extension_counts:   IndexMap<String, usize>,
}

/// Everything known about the pending changes of one working tree.
///
/// A present `error` means the analysis stopped early and only `repo_path`
/// is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryAnalysis {
   pub repo_path:           String,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub branch:              Option<String>,
   #[serde(default)]
   pub changes:             Vec<ChangeRecord>,
   #[serde(default)]
   pub directory_tree:      DirectoryNode,
   #[serde(default)]
   pub relationships:       DirectoryRelationships,
   #[serde(default)]
   pub directory_summaries: Vec<DirectorySummary>,
   #[serde(default)]
   pub pattern_groups:      PatternGroups,
   #[serde(default)]
   pub total_files_changed: usize,
   #[serde(default)]
   pub total_lines_changed: usize,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub error:               Option<String>,
}

impl RepositoryAnalysis {
   /// Result for an analysis that failed part-way
   pub fn degraded(repo_path: impl Into<String>, message: impl Into<String>) -> Self {
      Self { repo_path: repo_path.into(), error: Some(message.into()), ..Default::default() }
   }

   pub const fn is_complete(&self) -> bool {
      self.error.is_none()
   }
}

/// Sum of added and deleted lines, counting unknown records as zero
pub fn total_lines_changed(records: &[ChangeRecord]) -> usize {
   records.iter().map(ChangeRecord::total_lines).sum()
}

/// One summary per directory holding a change, in first-seen order
pub fn summarize_directories(records: &[ChangeRecord]) -> Vec<DirectorySummary> {
   let mut by_dir: IndexMap<&str, DirectorySummary> = IndexMap::new();

   for record in records {
      let dir = record.directory();
      let summary = by_dir.entry(dir).or_insert_with(|| DirectorySummary {
         path:               dir.to_string(),
         file_count:         0,
         total_line_changes: 0,
         extension_counts:   IndexMap::new(),
      });
      summary.file_count += 1;
      summary.total_line_changes += record.total_lines();
      let ext = file_extension(&record.path)
         .map_or_else(|| NO_EXTENSION_SUMMARY.to_string(), |e| format!(".{e}"));
      *summary.extension_counts.entry(ext).or_insert(0) += 1;
   }

   by_dir.into_values().collect()
}

/// Analyze the working tree at `repo_path` with git.
///
/// Fails only for invalid input: a missing path, a path that is not a git
/// work tree, a zero `max_depth`, or an exclude pattern that does not compile. Failures while
/// talking to git produce a degraded result instead.
pub fn analyze(
   repo_path: impl AsRef<Path>,
   options: &AnalysisOptions,
) -> Result<RepositoryAnalysis> {
   let requested = repo_path.as_ref();
   let invalid = |reason: String| AnalyzerError::InvalidRepository {
      path: requested.display().to_string(),
      reason,
   };

   let root = requested
      .canonicalize()
      .map_err(|e| invalid(format!("cannot resolve path: {e}")))?;
   if !root.is_dir() {
      return Err(invalid("not a directory".to_string()));
   }

   // status paths are relative to the top level even when run from a subdirectory
   let root = GitRunner::new(&root)
      .run(&["rev-parse", "--show-toplevel"])
      .ok()
      .map(|out| out.trim().to_string())
      .filter(|top| !top.is_empty())
      .map_or(root, PathBuf::from);

   let mut runner = GitRunner::new(root);
   if let Some(flag) = &options.cancel {
      runner = runner.with_cancel(Arc::clone(flag));
   }
   analyze_with(&runner, options)
}

/// Analyze through any [`ChangeSource`]
pub fn analyze_with<S: ChangeSource + ?Sized>(
   source: &S,
   options: &AnalysisOptions,
) -> Result<RepositoryAnalysis> {
   options.validate()?;
   let repo_path = source.repo_root().display().to_string();

   if !source.is_repository() {
      return Err(AnalyzerError::InvalidRepository {
         path:   repo_path,
         reason: "not a git work tree".to_string(),
      });
   }
   let rules = ExcludeRules::new(&options.exclude_patterns)?;

   info!(
      repo = %repo_path,
      max_files = ?options.max_files,
      max_depth = options.max_depth,
      "starting analysis"
   );

   match run_analysis(source, options, &rules, &repo_path) {
      Ok(analysis) => {
         info!(
            files = analysis.total_files_changed,
            lines = analysis.total_lines_changed,
            "analysis complete"
         );
         Ok(analysis)
      },
      Err(AnalyzerError::Cancelled) => Err(AnalyzerError::Cancelled),
      Err(e) => {
         warn!(repo = %repo_path, error = %e, "analysis degraded");
         Ok(RepositoryAnalysis::degraded(repo_path, format!("Analysis failed: {e}")))
      },
   }
}

fn run_analysis<S: ChangeSource + ?Sized>(
   source: &S,
   options: &AnalysisOptions,
   rules: &ExcludeRules,
   repo_path: &str,
) -> Result<RepositoryAnalysis> {
   let status = source.list_changed_paths()?;
   let mut changes = parse_status(&status);

   if let Some(max) = options.max_files.filter(|&n| n > 0)
      && changes.len() > max
   {
      info!(listed = changes.len(), kept = max, "truncating change list");
      changes.truncate(max);
   }

   collect_metrics(source, &mut changes, options.concurrency);
   if options.is_cancelled() {
      return Err(AnalyzerError::Cancelled);
   }

   let branch = source
      .current_branch()
      .ok()
      .filter(|b| !b.is_empty());

   let directory_tree = build_tree(source.repo_root(), options.max_depth, rules);
   let relationships = analyze_relationships(&directory_tree);

   let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
   let pattern_groups = group_files(&paths);
   let directory_summaries = summarize_directories(&changes);

   Ok(RepositoryAnalysis {
      repo_path: repo_path.to_string(),
      branch,
      total_files_changed: changes.len(),
      total_lines_changed: total_lines_changed(&changes),
      changes,
      directory_tree,
      relationships,
      directory_summaries,
      pattern_groups,
      error: None,
   })
}

#[cfg(test)]
mod tests {
   use pretty_assertions::assert_eq;

   use super::*;
   use crate::{
      metrics::{FileKind, LineChanges},
      status::FileStatus,
      testing::ScriptedSource,
   };

   fn populated_source() -> ScriptedSource {
      ScriptedSource::new()
         .with_status(" M src/lib.rs\nA  src/new.rs\n?? docs/guide.md\nR  old.txt -> notes.txt\n")
         .with_file("src/lib.rs", "fn a() {}\n")
         .with_file("src/new.rs", "fn b() {}\n")
         .with_file("docs/guide.md", "# guide\n")
         .with_file("notes.txt", "hi\n")
         .with_file(".git/HEAD", "ref: refs/heads/main\n")
         .with_empty_diff("src/lib.rs", "1\t0\tsrc/lib.rs\n")
         .with_empty_diff("src/new.rs", "1\t0\tsrc/new.rs\n")
         .with_empty_diff("docs/guide.md", "1\t0\tdocs/guide.md\n")
         .with_empty_diff("notes.txt", "1\t0\tnotes.txt\n")
         .with_numstat("src/lib.rs", "4\t2\tsrc/lib.rs\n")
         .with_numstat("src/new.rs", "")
         .with_cached_numstat("src/new.rs", "1\t0\tsrc/new.rs\n")
         .with_numstat("docs/guide.md", "")
         .with_numstat("notes.txt", "")
         .with_cached_numstat("notes.txt", "0\t0\told.txt => notes.txt\n")
   }

   #[test]
   fn test_full_analysis() {
      let src = populated_source();
      let analysis = analyze_with(&src, &AnalysisOptions::default()).unwrap();

      assert!(analysis.is_complete());
      assert_eq!(analysis.branch.as_deref(), Some("main"));
      let paths: Vec<&str> = analysis.changes.iter().map(|c| c.path.as_str()).collect();
      assert_eq!(paths, vec!["src/lib.rs", "src/new.rs", "docs/guide.md", "notes.txt"]);

      assert_eq!(analysis.changes[0].line_changes, Some(LineChanges { added: 4, deleted: 2 }));
      assert_eq!(analysis.changes[1].line_changes, Some(LineChanges { added: 1, deleted: 0 }));
      assert_eq!(analysis.changes[2].line_changes, Some(LineChanges { added: 1, deleted: 0 }));
      assert_eq!(analysis.changes[3].original_path.as_deref(), Some("old.txt"));
      assert_eq!(analysis.changes[3].line_changes, Some(LineChanges::default()));
      assert!(src.calls().contains(&"numstat --cached old.txt notes.txt".to_string()));
      assert!(analysis.changes.iter().all(|c| c.file_kind == FileKind::Text));

      assert_eq!(analysis.total_files_changed, 4);
      assert_eq!(analysis.total_lines_changed, 8);

      let summary_paths: Vec<&str> =
         analysis.directory_summaries.iter().map(|s| s.path.as_str()).collect();
      assert_eq!(summary_paths, vec!["src", "docs", ""]);
      assert_eq!(analysis.directory_summaries[0].file_count, 2);
      assert_eq!(analysis.directory_summaries[0].total_line_changes, 7);
      assert_eq!(analysis.directory_summaries[0].extension_counts[".rs"], 2);

      assert_eq!(analysis.pattern_groups.logical_groups.len(), 1);
      assert_eq!(analysis.pattern_groups.logical_groups[0].name, "src");

      let top: Vec<&str> = analysis
         .directory_tree
         .children
         .iter()
         .map(|n| n.name.as_str())
         .collect();
      assert_eq!(top, vec!["docs", "notes.txt", "src"]);
      assert!(analysis.relationships.are_siblings("docs", "src"));
   }

   #[test]
   fn test_not_a_repository_fails_fast() {
      let src = ScriptedSource::new().not_a_repository();
      let err = analyze_with(&src, &AnalysisOptions::default()).unwrap_err();
      assert!(matches!(err, AnalyzerError::InvalidRepository { .. }));
      assert_eq!(src.calls(), vec!["is_repository"]);
   }

   #[test]
   fn test_invalid_pattern_is_input_error() {
      let src = ScriptedSource::new();
      let options =
         AnalysisOptions { exclude_patterns: vec!["[".to_string()], ..Default::default() };
      let err = analyze_with(&src, &options).unwrap_err();
      assert!(err.is_invalid_input());
      assert!(!src.calls().contains(&"status".to_string()));
   }

   #[test]
   fn test_zero_depth_is_input_error() {
      let src = ScriptedSource::new();
      let options = AnalysisOptions { max_depth: 0, ..Default::default() };
      let err = analyze_with(&src, &options).unwrap_err();
      assert!(matches!(err, AnalyzerError::InvalidOption { name: "max_depth", .. }));
      assert!(err.is_invalid_input());
      assert!(src.calls().is_empty());
   }

   #[test]
   fn test_status_failure_degrades() {
      let src = ScriptedSource::new()
         .failing_status()
         .with_file("src/lib.rs", "");
      let analysis = analyze_with(&src, &AnalysisOptions::default()).unwrap();

      let error = analysis.error.as_deref().unwrap();
      assert!(error.starts_with("Analysis failed: "), "{error}");
      assert_eq!(analysis.repo_path, src.repo_root().display().to_string());
      assert!(analysis.changes.is_empty());
      assert!(analysis.directory_tree.children.is_empty());
      assert_eq!(analysis.total_files_changed, 0);
      assert!(!src.calls().iter().any(|c| c.starts_with("numstat")));
   }

   #[test]
   fn test_per_file_failure_is_not_escalated() {
      let src = ScriptedSource::new()
         .with_status(" M a.rs\n M b.rs\n")
         .with_file("a.rs", "")
         .with_file("b.rs", "")
         .with_empty_diff("a.rs", "")
         .with_empty_diff("b.rs", "")
         .with_numstat("b.rs", "2\t2\tb.rs\n");
      let analysis = analyze_with(&src, &AnalysisOptions::default()).unwrap();

      assert!(analysis.error.is_none());
      assert_eq!(analysis.changes[0].line_changes, None);
      assert_eq!(analysis.changes[1].line_changes, Some(LineChanges { added: 2, deleted: 2 }));
      assert_eq!(analysis.total_lines_changed, 4);
   }

   #[test]
   fn test_truncation_keeps_listing_order() {
      let src = ScriptedSource::new().with_status(" M c.rs\n M a.rs\n M b.rs\n");
      let options = AnalysisOptions { max_files: Some(2), ..Default::default() };
      let analysis = analyze_with(&src, &options).unwrap();

      let paths: Vec<&str> = analysis.changes.iter().map(|c| c.path.as_str()).collect();
      assert_eq!(paths, vec!["c.rs", "a.rs"]);
      assert_eq!(analysis.total_files_changed, 2);
      assert!(!src.calls().contains(&"numstat b.rs".to_string()));
   }

   #[test]
   fn test_zero_max_files_keeps_everything() {
      let src = ScriptedSource::new().with_status(" M a.rs\n M b.rs\n");
      let options = AnalysisOptions { max_files: Some(0), ..Default::default() };
      let analysis = analyze_with(&src, &options).unwrap();
      assert_eq!(analysis.total_files_changed, 2);
   }

   #[test]
   fn test_missing_branch_is_not_an_error() {
      let src = ScriptedSource::new().without_branch();
      let analysis = analyze_with(&src, &AnalysisOptions::default()).unwrap();
      assert!(analysis.is_complete());
      assert_eq!(analysis.branch, None);
   }

   #[test]
   fn test_cancelled_analysis_returns_no_result() {
      let flag = Arc::new(AtomicBool::new(true));
      let src = ScriptedSource::new().with_status(" M a.rs\n");
      let options = AnalysisOptions { cancel: Some(flag), ..Default::default() };
      assert!(matches!(analyze_with(&src, &options), Err(AnalyzerError::Cancelled)));
   }

   #[test]
   fn test_repeated_runs_serialize_identically() {
      let src = populated_source();
      let first = serde_json::to_string(&analyze_with(&src, &AnalysisOptions::default()).unwrap())
         .unwrap();
      let second = serde_json::to_string(&analyze_with(&src, &AnalysisOptions::default()).unwrap())
         .unwrap();
      assert_eq!(first, second);
   }

   #[test]
   fn test_json_round_trip_and_shape() {
      let src = populated_source();
      let analysis = analyze_with(&src, &AnalysisOptions::default()).unwrap();
      let json = serde_json::to_value(&analysis).unwrap();

      assert!(json.get("error").is_none());
      assert_eq!(json["changes"][0]["unstaged_status"], "modified");
      assert_eq!(json["changes"][0]["file_kind"], "text");
      assert_eq!(json["changes"][3]["staged_status"], "renamed");
      assert_eq!(json["pattern_groups"]["by_extension"][".rs"][1], "src/new.rs");

      let back: RepositoryAnalysis = serde_json::from_value(json).unwrap();
      assert_eq!(back, analysis);
   }

   #[test]
   fn test_degraded_json_omits_empty_error_fields() {
      let json = serde_json::to_value(RepositoryAnalysis::degraded("/r", "Analysis failed: x"))
         .unwrap();
      assert_eq!(json["repo_path"], "/r");
      assert_eq!(json["error"], "Analysis failed: x");
      assert!(json.get("branch").is_none());
   }

   #[test]
   fn test_totals_treat_unknown_as_zero() {
      let mut a = ChangeRecord::new("a", FileStatus::Modified, FileStatus::None);
      a.line_changes = Some(LineChanges { added: 3, deleted: 1 });
      let b = ChangeRecord::new("b", FileStatus::Deleted, FileStatus::None);
      let mut c = ChangeRecord::new("c", FileStatus::None, FileStatus::Modified);
      c.line_changes = Some(LineChanges { added: 0, deleted: 5 });
      assert_eq!(total_lines_changed(&[a, b, c]), 9);
   }

   #[test]
   fn test_analyze_rejects_missing_path() {
      let dir = tempfile::TempDir::new().unwrap();
      let err = analyze(dir.path().join("nope"), &AnalysisOptions::default()).unwrap_err();
      assert!(matches!(err, AnalyzerError::InvalidRepository { .. }));
   }
}
