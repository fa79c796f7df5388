use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::{
   analysis::{AnalysisOptions, DEFAULT_CONCURRENCY},
   error::{AnalyzerError, Result},
   tree::DEFAULT_MAX_DEPTH,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
   /// Cap on changed files analyzed in full (0 disables the cap)
   pub max_files_per_analysis: usize,

   /// How many levels below the root the directory tree descends
   pub max_depth: usize,

   /// Globs excluded from the directory tree
   pub exclude_patterns: Vec<String>,

   /// Worker threads for per-file diff metrics
   pub metrics_concurrency: usize,
}

impl Default for AnalyzerConfig {
   fn default() -> Self {
      Self {
         max_files_per_analysis: 1000,
         max_depth:              DEFAULT_MAX_DEPTH,
         exclude_patterns:       Vec::new(),
         metrics_concurrency:    DEFAULT_CONCURRENCY,
      }
   }
}

impl AnalyzerConfig {
   /// Load config from default location
   /// (~/.config/change-analyzer/config.toml), or from
   /// `CHANGE_ANALYZER_CONFIG` when set. Falls back to Default if the file
   /// doesn't exist. Environment variables override file values:
   /// - `CHANGE_ANALYZER_MAX_FILES` overrides `max_files_per_analysis`
   /// - `CHANGE_ANALYZER_MAX_DEPTH` overrides `max_depth`
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("CHANGE_ANALYZER_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_else(|_| PathBuf::new())
      };

      let mut config = if config_path.is_file() {
         Self::parse_file(&config_path)?
      } else {
         Self::default()
      };

      config.apply_env_overrides();
      Ok(config)
   }

   /// Load config from specific file
   pub fn from_file(path: &Path) -> Result<Self> {
      let mut config = Self::parse_file(path)?;
      config.apply_env_overrides();
      Ok(config)
   }

   fn parse_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path).map_err(|e| {
         AnalyzerError::Config(format!("Failed to read {}: {e}", path.display()))
      })?;
      Self::from_toml(&contents)
   }

   pub fn from_toml(contents: &str) -> Result<Self> {
      toml::from_str(contents).map_err(|e| AnalyzerError::Config(format!("Failed to parse config: {e}")))
   }

   fn apply_env_overrides(&mut self) {
      if let Some(n) = positive_env("CHANGE_ANALYZER_MAX_FILES") {
         self.max_files_per_analysis = n;
      }
      if let Some(n) = positive_env("CHANGE_ANALYZER_MAX_DEPTH") {
         self.max_depth = n;
      }
   }

   /// Per-call options seeded from this config
   pub fn to_options(&self) -> AnalysisOptions {
      AnalysisOptions {
         max_files: Some(self.max_files_per_analysis).filter(|&n| n > 0),
         max_depth: self.max_depth,
         exclude_patterns: self.exclude_patterns.clone(),
         concurrency: self.metrics_concurrency.max(1),
         cancel: None,
      }
   }

   /// Get default config path (platform-safe)
   /// Tries HOME (Unix/Linux/macOS) then USERPROFILE (Windows)
   pub fn default_config_path() -> Result<PathBuf> {
      if let Ok(home) = std::env::var("HOME") {
         return Ok(PathBuf::from(home).join(".config/change-analyzer/config.toml"));
      }

      if let Ok(home) = std::env::var("USERPROFILE") {
         return Ok(PathBuf::from(home).join(".config/change-analyzer/config.toml"));
      }

      Err(AnalyzerError::Config("No home directory found (tried HOME and USERPROFILE)".to_string()))
   }
}

fn positive_env(name: &str) -> Option<usize> {
   let raw = std::env::var(name).ok()?;
   match raw.trim().parse::<usize>() {
      Ok(n) if n > 0 => Some(n),
      _ => {
         warn!(var = name, value = %raw, "ignoring override, expected a positive integer");
         None
      },
   }
}
