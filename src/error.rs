use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
   #[error("Invalid repository '{path}': {reason}")]
   InvalidRepository { path: String, reason: String },

   #[error("Git command failed: {command} (exit {}): {stderr}", exit_label(.exit_code))]
   CommandFailed {
      command:   String,
      exit_code: Option<i32>,
      stderr:    String,
   },

   #[error("Failed to run {command}: {source}")]
   CommandSpawn {
      command: String,
      #[source]
      source:  std::io::Error,
   },

   #[error("Refusing to run git without arguments")]
   EmptyCommand,

   #[error("Unexpected git output: {0}")]
   Parse(String),

   #[error("Invalid exclude pattern '{pattern}': {reason}")]
   InvalidPattern { pattern: String, reason: String },

   #[error("Invalid option {name}: {reason}")]
   InvalidOption { name: &'static str, reason: String },

   #[error("Analysis cancelled")]
   Cancelled,

   #[error("Configuration error: {0}")]
   Config(String),

   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   #[error("JSON error: {0}")]
   Json(#[from] serde_json::Error),
}

#[allow(clippy::ref_option, reason = "thiserror passes fields by reference")]
fn exit_label(code: &Option<i32>) -> String {
   code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

impl AnalyzerError {
   /// True for errors caused by the caller's input rather than by the analysis
   /// itself.
   pub const fn is_invalid_input(&self) -> bool {
      matches!(
         self,
         Self::InvalidRepository { .. } | Self::InvalidPattern { .. } | Self::InvalidOption { .. }
      )
   }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
