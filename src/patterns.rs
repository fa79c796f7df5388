//! Grouping of changed files by directory, extension and top-level segment.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::status::{file_extension, parent_dir};

/// `by_extension` key for files without an extension
pub const NO_EXTENSION: &str = "no_extension";

/// Files sharing a top-level path segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalGroup {
   pub name:  String,
   pub files: Vec<String>,
   pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternGroups {
   /// Containing directory (empty for the root) to files, first-seen order
   pub by_directory:   IndexMap<String, Vec<String>>,
   /// Dotted lower-case extension (or [`NO_EXTENSION`]) to files
   pub by_extension:   IndexMap<String, Vec<String>>,
   /// Groups of two or more files, largest first
   pub logical_groups: Vec<LogicalGroup>,
}

/// `.ext` key used by the extension groupings
pub fn extension_key(path: &str) -> String {
   file_extension(path).map_or_else(|| NO_EXTENSION.to_string(), |ext| format!(".{ext}"))
}

/// Group changed file paths. Renamed files contribute their new path only.
pub fn group_files<S: AsRef<str>>(paths: &[S]) -> PatternGroups {
   let mut groups = PatternGroups::default();
   let mut by_prefix: IndexMap<&str, Vec<String>> = IndexMap::new();

   for path in paths {
      let path = path.as_ref();
      groups
         .by_directory
         .entry(parent_dir(path).to_string())
         .or_default()
         .push(path.to_string());
      groups
         .by_extension
         .entry(extension_key(path))
         .or_default()
         .push(path.to_string());

      // root-level files have no grouping segment
      if let Some((prefix, _)) = path.split_once('/') {
         by_prefix.entry(prefix).or_default().push(path.to_string());
      }
   }

   groups.logical_groups = by_prefix
      .into_iter()
      .filter(|(_, files)| files.len() >= 2)
      .map(|(name, files)| LogicalGroup { name: name.to_string(), count: files.len(), files })
      .collect();
   // stable: equal counts keep first-seen order
   groups
      .logical_groups
      .sort_by(|a, b| b.count.cmp(&a.count));

   groups
}
