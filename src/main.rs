use std::process::ExitCode;

use change_analyzer::*;
use clap::Parser;
use state::{ExecutionRecord, JsonlStateStore, StateStore};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use types::{Args, OutputFormat};

/// Tool name stored in execution records
const TOOL_NAME: &str = "analyze_repository";

/// Send logs to stderr; `RUST_LOG` wins over `-v`
fn init_logging(args: &Args) {
   let filter = EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new(args.log_level()));
   let subscriber = tracing_subscriber::registry().with(filter).with(
      fmt::layer()
         .with_writer(std::io::stderr)
         .with_target(false),
   );
   if tracing::subscriber::set_global_default(subscriber).is_err() {
      eprintln!("Warning: logging already initialized");
   }
}

/// Load config from args or default
fn load_config_from_args(args: &Args) -> Result<AnalyzerConfig> {
   if let Some(ref config_path) = args.config {
      AnalyzerConfig::from_file(config_path)
   } else {
      AnalyzerConfig::load()
   }
}

fn print_analysis(analysis: &RepositoryAnalysis, format: OutputFormat) -> Result<()> {
   match format {
      OutputFormat::Json => println!("{}", serde_json::to_string(analysis)?),
      OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(analysis)?),
      OutputFormat::Summary => println!("{}", style::render_summary(analysis)),
   }
   Ok(())
}

fn run(args: &Args) -> Result<()> {
   let config = load_config_from_args(args)?;
   let mut options = config.to_options();
   args.apply_to(&mut options);
   debug!(?options, "effective options");

   let analysis = analyze(&args.dir, &options)?;

   if let Some(path) = &args.state_file {
      let record = ExecutionRecord::new(
         TOOL_NAME,
         analysis.repo_path.clone(),
         args.recorded_arguments(&options),
      );
      // a failed write never hides the analysis itself
      if let Err(e) = JsonlStateStore::new(path).put(&record) {
         warn!(path = %path.display(), error = %e, "could not record execution");
      } else {
         debug!(execution_id = %record.execution_id, "execution recorded");
      }
   }

   print_analysis(&analysis, args.format)
}

fn main() -> ExitCode {
   let args = Args::parse();
   init_logging(&args);

   match run(&args) {
      Ok(()) => ExitCode::SUCCESS,
      Err(e) => {
         eprintln!("{} {e}", style::error("Error:"));
         if e.is_invalid_input() { ExitCode::from(2) } else { ExitCode::FAILURE }
      },
   }
}
