use serde::{Deserialize, Serialize};

use crate::{status::parent_dir, tree::DirectoryNode};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentChild {
   pub parent: String,
   pub child:  String,
}

/// Directory pairs derived from tree paths
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectoryRelationships {
   pub parent_child: Vec<ParentChild>,
   /// Unordered pairs, stored in discovery order
   pub siblings:     Vec<(String, String)>,
}

impl DirectoryRelationships {
   pub fn is_parent_of(&self, parent: &str, child: &str) -> bool {
      self
         .parent_child
         .iter()
         .any(|pc| pc.parent == parent && pc.child == child)
   }

   pub fn are_siblings(&self, a: &str, b: &str) -> bool {
      self
         .siblings
         .iter()
         .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
   }
}

/// Relative paths of every directory below the root, pre-order
pub fn directory_paths(tree: &DirectoryNode) -> Vec<&str> {
   let mut paths = Vec::new();
   tree.visit(&mut |node| {
      if node.is_directory() && !node.relative_path.is_empty() {
         paths.push(node.relative_path.as_str());
      }
   });
   paths
}

/// Classify every pair of directories as parent/child, siblings, or
/// unrelated.
///
/// Pairwise over the directory count; trees are depth-bounded so this stays
/// small in practice.
pub fn analyze_relationships(tree: &DirectoryNode) -> DirectoryRelationships {
   let dirs = directory_paths(tree);
   let parents: Vec<&str> = dirs.iter().map(|&d| parent_dir(d)).collect();
   let mut rel = DirectoryRelationships::default();

   for i in 0..dirs.len() {
      for j in (i + 1)..dirs.len() {
         let (a, b) = (dirs[i], dirs[j]);
         if parents[j] == a {
            rel.parent_child.push(ParentChild { parent: a.to_string(), child: b.to_string() });
         } else if parents[i] == b {
            rel.parent_child.push(ParentChild { parent: b.to_string(), child: a.to_string() });
         } else if parents[i] == parents[j] {
            rel.siblings.push((a.to_string(), b.to_string()));
         }
      }
   }

   rel
}
