//! Repository change analysis library
//!
//! This library inspects the pending changes of a git working tree and turns
//! them into a structured report: per-file status and line counts, a bounded
//! directory tree, directory relationships, and groupings by location and
//! file type.
pub mod analysis;
pub mod config;
pub mod error;
pub mod git;
pub mod metrics;
pub mod patterns;
pub mod relationships;
pub mod state;
pub mod status;
pub mod style;
pub mod tree;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use analysis::{AnalysisOptions, RepositoryAnalysis, analyze, analyze_with};
pub use config::AnalyzerConfig;
pub use error::{AnalyzerError, Result};
pub use git::{ChangeSource, GitRunner};
