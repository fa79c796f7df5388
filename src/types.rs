use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde_json::{Value, json};

use crate::analysis::AnalysisOptions;

/// How the analysis is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
   /// Compact JSON on one line
   #[default]
   Json,
   /// Indented JSON
   Pretty,
   /// Human-readable report
   Summary,
}

// CLI Args
#[derive(Parser, Debug)]
#[command(author, version, about = "Analyze the pending changes of a git working tree", long_about = None)]
pub struct Args {
   /// Directory of the working tree to analyze
   #[arg(long, default_value = ".")]
   pub dir: String,

   /// Analyze at most N changed files (0 analyzes all)
   #[arg(long)]
   pub max_files: Option<usize>,

   /// Levels below the root included in the directory tree (at least 1)
   #[arg(long, value_parser = parse_positive)]
   pub max_depth: Option<usize>,

   /// Glob excluded from the directory tree (repeatable)
   #[arg(long)]
   pub exclude: Vec<String>,

   /// Path to config file (default: ~/.config/change-analyzer/config.toml)
   #[arg(long)]
   pub config: Option<PathBuf>,

   /// Output format
   #[arg(long, value_enum, default_value = "json")]
   pub format: OutputFormat,

   /// Append an execution record to this JSON-lines file
   #[arg(long)]
   pub state_file: Option<PathBuf>,

   /// Increase log verbosity (-v info, -vv debug)
   #[arg(long, short = 'v', action = clap::ArgAction::Count)]
   pub verbose: u8,
}

fn parse_positive(raw: &str) -> Result<usize, String> {
   match raw.parse::<usize>() {
      Ok(0) => Err("must be at least 1".to_string()),
      Ok(n) => Ok(n),
      Err(e) => Err(e.to_string()),
   }
}

impl Args {
   /// Layer command-line values over config-derived options
   pub fn apply_to(&self, options: &mut AnalysisOptions) {
      if let Some(max) = self.max_files {
         options.max_files = Some(max).filter(|&n| n > 0);
      }
      if let Some(depth) = self.max_depth {
         options.max_depth = depth;
      }
      options
         .exclude_patterns
         .extend(self.exclude.iter().cloned());
   }

   /// Effective arguments as recorded in the state file
   pub fn recorded_arguments(&self, options: &AnalysisOptions) -> Value {
      json!({
         "max_files": options.max_files,
         "max_depth": options.max_depth,
         "exclude_patterns": options.exclude_patterns,
      })
   }

   /// Log filter directive for the `-v` count
   pub const fn log_level(&self) -> &'static str {
      match self.verbose {
         0 => "warn",
         1 => "info",
         _ => "debug",
      }
   }
}
