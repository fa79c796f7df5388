//! Execution records for the state cache
//!
//! The analysis engine never reads or writes these; callers record each
//! invocation keyed by an id they generate.

use std::{
   fs::{self, OpenOptions},
   io::{BufRead, BufReader, Write},
   path::PathBuf,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One recorded tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
   pub execution_id: String,
   pub tool:         String,
   pub repo_path:    String,
   pub arguments:    Value,
   pub timestamp:    DateTime<Utc>,
}

impl ExecutionRecord {
   /// Record stamped now, with a freshly generated id
   pub fn new(tool: impl Into<String>, repo_path: impl Into<String>, arguments: Value) -> Self {
      let timestamp = Utc::now();
      Self {
         execution_id: generate_execution_id(timestamp),
         tool: tool.into(),
         repo_path: repo_path.into(),
         arguments,
         timestamp,
      }
   }
}

/// `exec-<utc timestamp>-<pid>`
pub fn generate_execution_id(at: DateTime<Utc>) -> String {
   format!("exec-{}-{}", at.format("%Y%m%dT%H%M%S%.6fZ"), std::process::id())
}

/// Keyed storage for execution records
pub trait StateStore {
   fn put(&mut self, record: &ExecutionRecord) -> Result<()>;

   /// Latest record stored under `execution_id`
   fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>>;
}

/// Append-only JSON-lines file, one record per line
#[derive(Debug, Clone)]
pub struct JsonlStateStore {
   path: PathBuf,
}

impl JsonlStateStore {
   pub fn new(path: impl Into<PathBuf>) -> Self {
      Self { path: path.into() }
   }
}

impl StateStore for JsonlStateStore {
   fn put(&mut self, record: &ExecutionRecord) -> Result<()> {
      if let Some(parent) = self.path.parent()
         && !parent.as_os_str().is_empty()
      {
         fs::create_dir_all(parent)?;
      }
      let mut file = OpenOptions::new()
         .create(true)
         .append(true)
         .open(&self.path)?;
      let line = serde_json::to_string(record)?;
      writeln!(file, "{line}")?;
      Ok(())
   }

   fn get(&self, execution_id: &str) -> Result<Option<ExecutionRecord>> {
      if !self.path.exists() {
         return Ok(None);
      }
      let reader = BufReader::new(fs::File::open(&self.path)?);
      let mut found = None;
      for line in reader.lines() {
         let line = line?;
         if line.trim().is_empty() {
            continue;
         }
         let record: ExecutionRecord = serde_json::from_str(&line)?;
         if record.execution_id == execution_id {
            found = Some(record);
         }
      }
      Ok(found)
   }
}
