//! Porcelain status parsing
//!
//! Turns `git status --porcelain=v1` output into [`ChangeRecord`]s carrying
//! status codes and paths. File kind and line counts are filled in later by
//! [`crate::metrics`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::metrics::{FileKind, LineChanges};

/// Separator between the old and new path of a rename or copy
const RENAME_SEPARATOR: &str = " -> ";

/// Change state of one status column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
   #[default]
   None,
   Added,
   Modified,
   Deleted,
   Renamed,
   Copied,
   Untracked,
   Ignored,
   Conflicted,
}

impl FileStatus {
   /// Map a porcelain status letter; `None` for letters git does not emit
   pub const fn from_code(code: char) -> Option<Self> {
      Some(match code {
         ' ' => Self::None,
         'A' => Self::Added,
         // type changes (T) are reported as modifications
         'M' | 'T' => Self::Modified,
         'D' => Self::Deleted,
         'R' => Self::Renamed,
         'C' => Self::Copied,
         '?' => Self::Untracked,
         '!' => Self::Ignored,
         'U' => Self::Conflicted,
         _ => return None,
      })
   }

   /// Canonical porcelain letter for this status
   pub const fn code(self) -> char {
      match self {
         Self::None => ' ',
         Self::Added => 'A',
         Self::Modified => 'M',
         Self::Deleted => 'D',
         Self::Renamed => 'R',
         Self::Copied => 'C',
         Self::Untracked => '?',
         Self::Ignored => '!',
         Self::Conflicted => 'U',
      }
   }

   pub const fn as_str(self) -> &'static str {
      match self {
         Self::None => "none",
         Self::Added => "added",
         Self::Modified => "modified",
         Self::Deleted => "deleted",
         Self::Renamed => "renamed",
         Self::Copied => "copied",
         Self::Untracked => "untracked",
         Self::Ignored => "ignored",
         Self::Conflicted => "conflicted",
      }
   }
}

impl fmt::Display for FileStatus {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

/// One changed path in the working tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
   /// Repository-relative, `/`-separated
   pub path:            String,
   /// Previous path, only for renames and copies
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub original_path:   Option<String>,
   pub staged_status:   FileStatus,
   pub unstaged_status: FileStatus,
   #[serde(default)]
   pub file_kind:       FileKind,
   /// Absent when the counts could not be determined
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub line_changes:    Option<LineChanges>,
}

impl ChangeRecord {
   pub fn new(path: impl Into<String>, staged: FileStatus, unstaged: FileStatus) -> Self {
      Self {
         path:            path.into(),
         original_path:   None,
         staged_status:   staged,
         unstaged_status: unstaged,
         file_kind:       FileKind::Unknown,
         line_changes:    None,
      }
   }

   /// Added plus deleted lines, zero when unknown
   pub fn total_lines(&self) -> usize {
      self.line_changes.map_or(0, |c| c.total())
   }

   pub const fn is_untracked(&self) -> bool {
      matches!(self.unstaged_status, FileStatus::Untracked)
         || matches!(self.staged_status, FileStatus::Untracked)
   }

   /// Directory containing `path`; empty for root-level files
   pub fn directory(&self) -> &str {
      parent_dir(&self.path)
   }

   /// Lower-cased extension of `path` without the dot
   pub fn extension(&self) -> Option<String> {
      file_extension(&self.path)
   }
}

/// Containing directory of a `/`-separated path (empty at the root)
pub fn parent_dir(path: &str) -> &str {
   path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Lower-cased extension of the final path segment, ignoring dotfiles
pub fn file_extension(path: &str) -> Option<String> {
   let name = path.rsplit('/').next().unwrap_or(path);
   let stem_len = name.trim_start_matches('.').len();
   if stem_len == 0 {
      return None;
   }
   let leading_dots = name.len() - stem_len;
   let (_, ext) = name[leading_dots..].rsplit_once('.')?;
   if ext.is_empty() {
      None
   } else {
      Some(ext.to_lowercase())
   }
}

/// Parse a full porcelain listing, skipping blank and malformed lines
pub fn parse_status(output: &str) -> Vec<ChangeRecord> {
   output.lines().filter_map(parse_status_line).collect()
}

/// Parse one `XY path` / `XY old -> new` line
pub fn parse_status_line(line: &str) -> Option<ChangeRecord> {
   let line = line.strip_suffix('\r').unwrap_or(line);
   if line.trim().is_empty() || line.len() < 3 {
      return None;
   }

   let mut chars = line.chars();
   let staged_code = chars.next()?;
   let unstaged_code = chars.next()?;

   // Rename/copy entries may carry a similarity score in place of the second
   // column ("R100 old -> new"); the score belongs to the code field.
   let (unstaged_code, path_start) =
      if matches!(staged_code, 'R' | 'C') && unstaged_code.is_ascii_digit() {
         let digits = line[1..].bytes().take_while(u8::is_ascii_digit).count();
         (' ', 1 + digits)
      } else {
         (unstaged_code, 3)
      };

   let Some(path_field) = line.get(path_start..).map(str::trim) else {
      debug!(line, "skipping status line with non-ascii code field");
      return None;
   };
   if path_field.is_empty() {
      debug!(line, "skipping status line without a path");
      return None;
   }

   let (Some(staged), Some(unstaged)) =
      (FileStatus::from_code(staged_code), FileStatus::from_code(unstaged_code))
   else {
      debug!(line, "skipping status line with unknown status code");
      return None;
   };

   let mut record = ChangeRecord::new(String::new(), staged, unstaged);
   if matches!(staged, FileStatus::Renamed | FileStatus::Copied)
      && let Some((old, new)) = path_field.split_once(RENAME_SEPARATOR)
   {
      let (old, new) = (unquote_path(old.trim()), unquote_path(new.trim()));
      if staged == FileStatus::Renamed && (old.is_empty() || old == new) {
         debug!(line, "skipping rename without a distinct source path");
         return None;
      }
      record.original_path = Some(old);
      record.path = new;
   } else if staged == FileStatus::Renamed {
      debug!(line, "skipping rename without a source path");
      return None;
   } else {
      record.path = unquote_path(path_field);
   }

   Some(record)
}

/// Undo git's C-style quoting of paths with special characters
fn unquote_path(raw: &str) -> String {
   let Some(inner) = raw
      .strip_prefix('"')
      .and_then(|s| s.strip_suffix('"'))
   else {
      return raw.to_string();
   };

   let mut bytes = Vec::with_capacity(inner.len());
   let mut iter = inner.bytes().peekable();
   while let Some(b) = iter.next() {
      if b != b'\\' {
         bytes.push(b);
         continue;
      }
      match iter.next() {
         Some(b'n') => bytes.push(b'\n'),
         Some(b't') => bytes.push(b'\t'),
         Some(b'r') => bytes.push(b'\r'),
         Some(b'a') => bytes.push(0x07),
         Some(b'b') => bytes.push(0x08),
         Some(b'f') => bytes.push(0x0c),
         Some(b'v') => bytes.push(0x0b),
         Some(d @ b'0'..=b'7') => {
            let mut value = u32::from(d - b'0');
            for _ in 0..2 {
               match iter.peek() {
                  Some(&next @ b'0'..=b'7') => {
                     value = value * 8 + u32::from(next - b'0');
                     iter.next();
                  },
                  _ => break,
               }
            }
            bytes.push(value as u8);
         },
         Some(other) => bytes.push(other),
         None => bytes.push(b'\\'),
      }
   }
   String::from_utf8_lossy(&bytes).into_owned()
}
