//! Working-tree directory snapshot
//!
//! Walks the filesystem under the repository root, bounded by depth and
//! exclusion globs, independent of which files changed.

use std::{fs, path::Path};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
   error::{AnalyzerError, Result},
   status::file_extension,
};

/// Version-control metadata directory, excluded at any depth
pub const VCS_METADATA_DIR: &str = ".git";

/// Default recursion limit for [`build_tree`]
pub const DEFAULT_MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
   #[default]
   Directory,
   File,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryNode {
   pub name:          String,
   /// `/`-separated, empty for the root
   pub relative_path: String,
   pub kind:          NodeKind,
   /// Lower-cased, without the dot; files only
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub extension:     Option<String>,
   /// Sorted by name; directories only
   #[serde(default, skip_serializing_if = "Vec::is_empty")]
   pub children:      Vec<Self>,
}

impl DirectoryNode {
   fn directory(name: String, relative_path: String) -> Self {
      Self { name, relative_path, kind: NodeKind::Directory, extension: None, children: Vec::new() }
   }

   fn file(name: String, relative_path: String) -> Self {
      let extension = file_extension(&name);
      Self { name, relative_path, kind: NodeKind::File, extension, children: Vec::new() }
   }

   pub fn is_directory(&self) -> bool {
      self.kind == NodeKind::Directory
   }

   /// Levels below this node (0 for a leaf)
   pub fn depth(&self) -> usize {
      self
         .children
         .iter()
         .map(|c| c.depth() + 1)
         .max()
         .unwrap_or(0)
   }

   /// Pre-order visit of this node and all descendants
   pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Self)) {
      f(self);
      for child in &self.children {
         child.visit(f);
      }
   }
}

/// Glob exclusions plus the implicit metadata-directory rule.
///
/// Patterns use shell-style matching on the repository-relative path, where
/// `*` also crosses `/`.
#[derive(Debug, Clone)]
pub struct ExcludeRules {
   set: GlobSet,
}

impl Default for ExcludeRules {
   fn default() -> Self {
      Self { set: GlobSet::empty() }
   }
}

impl ExcludeRules {
   pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
      let mut builder = GlobSetBuilder::new();
      for pattern in patterns {
         let pattern = pattern.as_ref();
         let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| AnalyzerError::InvalidPattern {
               pattern: pattern.to_string(),
               reason:  e.kind().to_string(),
            })?;
         builder.add(glob);
      }
      let set = builder.build().map_err(|e| AnalyzerError::InvalidPattern {
         pattern: patterns
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", "),
         reason:  e.to_string(),
      })?;
      Ok(Self { set })
   }

   pub fn is_excluded(&self, relative_path: &str) -> bool {
      relative_path
         .split('/')
         .any(|segment| segment == VCS_METADATA_DIR)
         || self.set.is_match(relative_path)
   }
}

/// Build the directory tree under `root`, descending at most `max_depth`
/// levels. Unreadable directories appear without children.
pub fn build_tree(root: &Path, max_depth: usize, rules: &ExcludeRules) -> DirectoryNode {
   let name = root
      .file_name()
      .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().into_owned());
   let mut node = DirectoryNode::directory(name, String::new());
   fill_directory(root, &mut node, 1, max_depth, rules);
   node
}

fn fill_directory(
   dir: &Path,
   node: &mut DirectoryNode,
   depth: usize,
   max_depth: usize,
   rules: &ExcludeRules,
) {
   if depth > max_depth {
      return;
   }

   let entries = match fs::read_dir(dir) {
      Ok(entries) => entries,
      Err(e) => {
         debug!(dir = %dir.display(), error = %e, "treating unreadable directory as empty");
         return;
      },
   };

   let mut listed: Vec<(String, bool)> = entries
      .filter_map(|entry| {
         let entry = entry.ok()?;
         // symlinks are reported as files so the walk never follows them
         let is_dir = entry.file_type().ok()?.is_dir();
         Some((entry.file_name().to_string_lossy().into_owned(), is_dir))
      })
      .collect();
   listed.sort();

   for (name, is_dir) in listed {
      let relative_path = if node.relative_path.is_empty() {
         name.clone()
      } else {
         format!("{}/{name}", node.relative_path)
      };
      if rules.is_excluded(&relative_path) {
         continue;
      }

      if is_dir {
         let mut child = DirectoryNode::directory(name.clone(), relative_path);
         fill_directory(&dir.join(&name), &mut child, depth + 1, max_depth, rules);
         node.children.push(child);
      } else {
         node.children.push(DirectoryNode::file(name, relative_path));
      }
   }
}

#[cfg(test)]
mod tests {
   use pretty_assertions::assert_eq;
   use tempfile::TempDir;

   use super::*;

   fn touch(root: &Path, rel: &str) {
      let path = root.join(rel);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, "").unwrap();
   }

   fn sample_tree() -> TempDir {
      let dir = TempDir::new().unwrap();
      let root = dir.path();
      touch(root, "README.md");
      touch(root, "src/lib.rs");
      touch(root, "src/Main.RS");
      touch(root, "src/nested/deep/deeper/leaf.txt");
      touch(root, "docs/guide.md");
      touch(root, "build.log");
      touch(root, ".git/HEAD");
      touch(root, "vendor/.git/config");
      fs::create_dir_all(root.join("empty")).unwrap();
      dir
   }

   fn all_paths(node: &DirectoryNode) -> Vec<String> {
      let mut paths = Vec::new();
      node.visit(&mut |n| paths.push(n.relative_path.clone()));
      paths
   }

   #[test]
   fn test_children_sorted_and_typed() {
      let dir = sample_tree();
      let tree = build_tree(dir.path(), 3, &ExcludeRules::default());

      let names: Vec<&str> = tree.children.iter().map(|c| c.name.as_str()).collect();
      assert_eq!(names, vec!["README.md", "build.log", "docs", "empty", "src", "vendor"]);

      let src = tree.children.iter().find(|c| c.name == "src").unwrap();
      assert!(src.is_directory());
      let main = src.children.iter().find(|c| c.name == "Main.RS").unwrap();
      assert_eq!(main.kind, NodeKind::File);
      assert_eq!(main.extension.as_deref(), Some("rs"));
      assert_eq!(main.relative_path, "src/Main.RS");
   }

   #[test]
   fn test_metadata_dir_never_appears() {
      let dir = sample_tree();
      let tree = build_tree(dir.path(), 5, &ExcludeRules::default());
      for path in all_paths(&tree) {
         assert!(!path.split('/').any(|s| s == VCS_METADATA_DIR), "{path}");
      }
   }

   #[test]
   fn test_depth_is_bounded() {
      let dir = sample_tree();
      for max_depth in 1..=5 {
         let tree = build_tree(dir.path(), max_depth, &ExcludeRules::default());
         assert!(tree.depth() <= max_depth, "depth {} > {max_depth}", tree.depth());
      }
      let tree = build_tree(dir.path(), 2, &ExcludeRules::default());
      assert!(!all_paths(&tree).contains(&"src/nested/deep".to_string()));
      assert!(all_paths(&tree).contains(&"src/nested".to_string()));
   }

   #[test]
   fn test_exclusion_patterns() {
      let dir = sample_tree();
      let rules = ExcludeRules::new(&["*.log", "docs"]).unwrap();
      let tree = build_tree(dir.path(), 3, &rules);
      let paths = all_paths(&tree);
      assert!(!paths.contains(&"build.log".to_string()));
      assert!(!paths.iter().any(|p| p.starts_with("docs")));
      assert!(paths.contains(&"src/lib.rs".to_string()));
   }

   #[test]
   fn test_star_crosses_separators() {
      let rules = ExcludeRules::new(&["*.tmp"]).unwrap();
      assert!(rules.is_excluded("a/b/c.tmp"));
      assert!(rules.is_excluded("sub/.git"));
      assert!(!rules.is_excluded("a/b/c.rs"));
   }

   #[test]
   fn test_invalid_pattern_rejected() {
      let err = ExcludeRules::new(&["src/[abc"]).unwrap_err();
      assert!(matches!(err, AnalyzerError::InvalidPattern { .. }));
   }

   #[test]
   fn test_missing_root_is_empty() {
      let dir = TempDir::new().unwrap();
      let tree = build_tree(&dir.path().join("gone"), 3, &ExcludeRules::default());
      assert_eq!(tree.name, "gone");
      assert!(tree.children.is_empty());
   }

   #[test]
   fn test_serialized_node_shape() {
      let node = DirectoryNode::file("a.PY".to_string(), "pkg/a.PY".to_string());
      let json = serde_json::to_value(&node).unwrap();
      assert_eq!(
         json,
         serde_json::json!({
            "name": "a.PY",
            "relative_path": "pkg/a.PY",
            "kind": "file",
            "extension": "py"
         })
      );
   }
}
