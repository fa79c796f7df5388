use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
   error::{AnalyzerError, Result},
   git::ChangeSource,
   status::{ChangeRecord, FileStatus},
};

/// Numstat marker git prints instead of counts for binary content
const NOT_APPLICABLE: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
   Text,
   Binary,
   #[default]
   Unknown,
}

impl FileKind {
   pub const fn as_str(self) -> &'static str {
      match self {
         Self::Text => "text",
         Self::Binary => "binary",
         Self::Unknown => "unknown",
      }
   }
}

/// Added/deleted line counts for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineChanges {
   pub added:   usize,
   pub deleted: usize,
}

impl LineChanges {
   pub const fn total(self) -> usize {
      self.added + self.deleted
   }
}

/// Parse the first line of `git diff --numstat` output.
///
/// `-` counts read as zero. Empty output is `Ok(None)`; a first line without
/// two count columns is a [`AnalyzerError::Parse`].
pub fn try_parse_numstat(output: &str) -> Result<Option<LineChanges>> {
   let Some(line) = output.lines().find(|l| !l.trim().is_empty()) else {
      return Ok(None);
   };
   let mut fields = line.split('\t');
   let added = fields.next().and_then(parse_count);
   let deleted = fields.next().and_then(parse_count);
   match (added, deleted) {
      (Some(added), Some(deleted)) => Ok(Some(LineChanges { added, deleted })),
      _ => Err(AnalyzerError::Parse(format!("expected numstat counts, got {:?}", line.trim()))),
   }
}

/// Lenient [`try_parse_numstat`]: malformed output reads as unknown
pub fn parse_numstat(output: &str) -> Option<LineChanges> {
   try_parse_numstat(output).ok().flatten()
}

fn parse_count(field: &str) -> Option<usize> {
   let field = field.trim();
   if field == NOT_APPLICABLE {
      Some(0)
   } else {
      field.parse().ok()
   }
}

/// Whether numstat output carries the binary marker in both count columns
fn is_binary_numstat(output: &str) -> bool {
   output
      .lines()
      .find(|l| !l.trim().is_empty())
      .is_some_and(|l| l.starts_with("-\t-\t"))
}

/// Classify a changed file by diffing it against empty input.
///
/// Also returns the counts from that diff, which stand in for line changes
/// of untracked files.
pub fn detect_file_kind<S: ChangeSource + ?Sized>(
   source: &S,
   path: &str,
) -> (FileKind, Option<LineChanges>) {
   let full_path = source.repo_root().join(path);
   if !full_path.is_file() {
      debug!(path, "file missing from working tree, kind unknown");
      return (FileKind::Unknown, None);
   }

   match source.diff_stats_against_empty(path) {
      Ok(out) if is_binary_numstat(&out) => (FileKind::Binary, None),
      Ok(out) => (FileKind::Text, parse_numstat(&out)),
      Err(e) => {
         warn!(path, error = %e, "could not determine file kind");
         (FileKind::Unknown, None)
      },
   }
}

/// Line counts for one record; `None` when git cannot say.
pub fn collect_line_changes<S: ChangeSource + ?Sized>(
   source: &S,
   record: &ChangeRecord,
   untracked_counts: Option<LineChanges>,
) -> Option<LineChanges> {
   let out = match source.file_diff_stats(&record.path) {
      Ok(out) => out,
      Err(e) => {
         warn!(path = %record.path, error = %e, "diff stats unavailable");
         return None;
      },
   };

   if !out.trim().is_empty() {
      return parse_or_warn(&record.path, &out);
   }

   // Nothing unstaged: the change lives in the index, or the file is new
   if record.is_untracked() {
      return untracked_counts;
   }
   if record.staged_status != FileStatus::None {
      return match source.staged_diff_stats(&record.path, record.original_path.as_deref()) {
         Ok(out) => parse_or_warn(&record.path, &out),
         Err(e) => {
            warn!(path = %record.path, error = %e, "staged diff stats unavailable");
            None
         },
      };
   }
   None
}

fn parse_or_warn(path: &str, output: &str) -> Option<LineChanges> {
   try_parse_numstat(output).unwrap_or_else(|e| {
      warn!(path, error = %e, "line changes unknown");
      None
   })
}

/// Fill in kind and line counts for one record
pub fn enrich_record<S: ChangeSource + ?Sized>(source: &S, record: &mut ChangeRecord) {
   let (kind, untracked_counts) = detect_file_kind(source, &record.path);
   record.file_kind = kind;
   record.line_changes = if kind == FileKind::Binary {
      None
   } else {
      collect_line_changes(source, record, untracked_counts)
   };
}

/// Enrich every record using at most `concurrency` worker threads.
///
/// Records keep their positions; only their metric fields change.
pub fn collect_metrics<S: ChangeSource + ?Sized>(
   source: &S,
   records: &mut [ChangeRecord],
   concurrency: usize,
) {
   use rayon::prelude::*;

   if records.is_empty() {
      return;
   }

   match rayon::ThreadPoolBuilder::new()
      .num_threads(concurrency.max(1))
      .build()
   {
      Ok(pool) => pool.install(|| {
         records
            .par_iter_mut()
            .for_each(|record| enrich_record(source, record));
      }),
      Err(e) => {
         warn!(error = %e, "worker pool unavailable, collecting metrics sequentially");
         for record in records.iter_mut() {
            enrich_record(source, record);
         }
      },
   }
}
