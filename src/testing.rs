//! Scripted [`ChangeSource`] for unit tests
//!
//! Serves captured git output from maps instead of running processes. Paths
//! without scripted output fail the way a non-zero git exit does. Files added
//! with [`ScriptedSource::with_file`] are written under a temporary root so
//! existence checks and tree walks see them.

use std::{
   collections::HashMap,
   fs,
   path::Path,
   sync::Mutex,
};

use tempfile::TempDir;

use crate::{
   error::{AnalyzerError, Result},
   git::ChangeSource,
};

pub struct ScriptedSource {
   dir:        TempDir,
   repository: bool,
   status:     Option<String>,
   numstat:    HashMap<String, String>,
   cached:     HashMap<String, String>,
   empty_diff: HashMap<String, String>,
   branch:     Option<String>,
   calls:      Mutex<Vec<String>>,
}

impl ScriptedSource {
   pub fn new() -> Self {
      Self {
         dir:        TempDir::new().unwrap(),
         repository: true,
         status:     Some(String::new()),
         numstat:    HashMap::new(),
         cached:     HashMap::new(),
         empty_diff: HashMap::new(),
         branch:     Some("main".to_string()),
         calls:      Mutex::new(Vec::new()),
      }
   }

   pub fn not_a_repository(mut self) -> Self {
      self.repository = false;
      self
   }

   pub fn with_status(mut self, status: &str) -> Self {
      self.status = Some(status.to_string());
      self
   }

   pub fn failing_status(mut self) -> Self {
      self.status = None;
      self
   }

   pub fn without_branch(mut self) -> Self {
      self.branch = None;
      self
   }

   pub fn with_file(self, path: &str, contents: &str) -> Self {
      let full = self.dir.path().join(path);
      if let Some(parent) = full.parent() {
         fs::create_dir_all(parent).unwrap();
      }
      fs::write(full, contents).unwrap();
      self
   }

   pub fn with_dir(self, path: &str) -> Self {
      fs::create_dir_all(self.dir.path().join(path)).unwrap();
      self
   }

   pub fn with_numstat(mut self, path: &str, output: &str) -> Self {
      self.numstat.insert(path.to_string(), output.to_string());
      self
   }

   pub fn with_cached_numstat(mut self, path: &str, output: &str) -> Self {
      self.cached.insert(path.to_string(), output.to_string());
      self
   }

   pub fn with_empty_diff(mut self, path: &str, output: &str) -> Self {
      self.empty_diff.insert(path.to_string(), output.to_string());
      self
   }

   /// Calls made so far, in order
   pub fn calls(&self) -> Vec<String> {
      self.calls.lock().unwrap().clone()
   }

   fn record(&self, call: String) {
      self.calls.lock().unwrap().push(call);
   }

   fn scripted(&self, call: String, output: Option<&String>) -> Result<String> {
      self.record(call.clone());
      output.cloned().ok_or_else(|| AnalyzerError::CommandFailed {
         command:   call,
         exit_code: Some(128),
         stderr:    "scripted failure".to_string(),
      })
   }
}

impl ChangeSource for ScriptedSource {
   fn repo_root(&self) -> &Path {
      self.dir.path()
   }

   fn is_repository(&self) -> bool {
      self.record("is_repository".to_string());
      self.repository
   }

   fn list_changed_paths(&self) -> Result<String> {
      self.scripted("status".to_string(), self.status.as_ref())
   }

   fn file_diff_stats(&self, path: &str) -> Result<String> {
      self.scripted(format!("numstat {path}"), self.numstat.get(path))
   }

   fn staged_diff_stats(&self, path: &str, original_path: Option<&str>) -> Result<String> {
      let call = match original_path {
         Some(original) => format!("numstat --cached {original} {path}"),
         None => format!("numstat --cached {path}"),
      };
      self.scripted(call, self.cached.get(path))
   }

   fn diff_stats_against_empty(&self, path: &str) -> Result<String> {
      self.scripted(format!("empty {path}"), self.empty_diff.get(path))
   }

   fn current_branch(&self) -> Result<String> {
      self.scripted("branch".to_string(), self.branch.as_ref())
   }
}
