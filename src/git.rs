use std::{
   io::Read,
   path::{Path, PathBuf},
   process::{Command, Output, Stdio},
   sync::{
      Arc,
      atomic::{AtomicBool, Ordering},
   },
   thread,
   time::Duration,
};

use tracing::debug;

use crate::error::{AnalyzerError, Result};

/// Read access to the change facts of one working tree.
///
/// Everything the engine learns from version control goes through this trait,
/// so parsing and aggregation can be exercised against captured text.
pub trait ChangeSource: Sync {
   /// Working-tree root that relative paths are resolved against
   fn repo_root(&self) -> &Path;

   /// Lightweight probe; never fails, answers "no" instead
   fn is_repository(&self) -> bool;

   /// Raw `--porcelain=v1` status listing
   fn list_changed_paths(&self) -> Result<String>;

   /// Raw numstat of the working-tree file against the index
   fn file_diff_stats(&self, path: &str) -> Result<String>;

   /// Raw numstat of the index against HEAD. With `original_path` set, both
   /// sides of a rename or copy are diffed together so git can pair them.
   fn staged_diff_stats(&self, path: &str, original_path: Option<&str>) -> Result<String>;

   /// Raw numstat of the file compared with an empty input
   fn diff_stats_against_empty(&self, path: &str) -> Result<String>;

   /// Name of the checked-out branch
   fn current_branch(&self) -> Result<String>;
}

/// Runs git subcommands with a working tree as the current directory.
#[derive(Debug, Clone)]
pub struct GitRunner {
   repo_path: PathBuf,
   cancel:    Option<Arc<AtomicBool>>,
}

impl GitRunner {
   pub fn new(repo_path: impl Into<PathBuf>) -> Self {
      Self { repo_path: repo_path.into(), cancel: None }
   }

   /// Refuse to start new processes once `flag` is raised
   pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
      self.cancel = Some(flag);
      self
   }

   pub fn repo_path(&self) -> &Path {
      &self.repo_path
   }

   /// Run `git <args>` and return its stdout
   pub fn run(&self, args: &[&str]) -> Result<String> {
      self.run_accepting(args, &[0])
   }

   /// Run `git <args>`, treating any exit code in `ok_codes` as success
   fn run_accepting(&self, args: &[&str], ok_codes: &[i32]) -> Result<String> {
      if args.is_empty() {
         return Err(AnalyzerError::EmptyCommand);
      }
      if self
         .cancel
         .as_ref()
         .is_some_and(|flag| flag.load(Ordering::Relaxed))
      {
         return Err(AnalyzerError::Cancelled);
      }

      let command = format!("git {}", args.join(" "));
      debug!(%command, repo = %self.repo_path.display(), "running git");

      let mut cmd = Command::new("git");
      cmd.args(args)
         .current_dir(&self.repo_path)
         .stdin(Stdio::null());
      let output = match &self.cancel {
         Some(flag) => run_cancellable(&mut cmd, flag),
         None => cmd.output().map(Some),
      }
      .map_err(|source| AnalyzerError::CommandSpawn { command: command.clone(), source })?
      .ok_or(AnalyzerError::Cancelled)?;

      if !output.status.code().is_some_and(|code| ok_codes.contains(&code)) {
         let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
         return Err(AnalyzerError::CommandFailed {
            command,
            exit_code: output.status.code(),
            stderr,
         });
      }

      Ok(String::from_utf8_lossy(&output.stdout).into_owned())
   }
}

/// How often a running process is checked against the cancel flag
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `cmd` to completion, killing it once `cancel` is raised.
///
/// Returns `Ok(None)` when the process was killed.
fn run_cancellable(cmd: &mut Command, cancel: &AtomicBool) -> std::io::Result<Option<Output>> {
   let mut child = cmd
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()?;

   // drain both pipes so a chatty process never blocks on a full buffer
   let stdout = child.stdout.take().map(drain);
   let stderr = child.stderr.take().map(drain);

   let status = loop {
      if let Some(status) = child.try_wait()? {
         break status;
      }
      if cancel.load(Ordering::Relaxed) {
         debug!(pid = child.id(), "killing cancelled process");
         let _ = child.kill();
         let _ = child.wait();
         return Ok(None);
      }
      thread::sleep(CANCEL_POLL_INTERVAL);
   };

   let collect = |reader: Option<thread::JoinHandle<Vec<u8>>>| {
      reader.and_then(|r| r.join().ok()).unwrap_or_default()
   };
   Ok(Some(Output { status, stdout: collect(stdout), stderr: collect(stderr) }))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
   thread::spawn(move || {
      let mut buf = Vec::new();
      let _ = pipe.read_to_end(&mut buf);
      buf
   })
}

impl ChangeSource for GitRunner {
   fn repo_root(&self) -> &Path {
      &self.repo_path
   }

   fn is_repository(&self) -> bool {
      match self.run(&["rev-parse", "--is-inside-work-tree"]) {
         Ok(out) => out.trim() == "true",
         Err(e) => {
            debug!(error = %e, "repository probe failed");
            false
         },
      }
   }

   fn list_changed_paths(&self) -> Result<String> {
      self.run(&["status", "--porcelain=v1", "--untracked-files=all"])
   }

   fn file_diff_stats(&self, path: &str) -> Result<String> {
      self.run(&["diff", "--numstat", "--", path])
   }

   fn staged_diff_stats(&self, path: &str, original_path: Option<&str>) -> Result<String> {
      match original_path {
         // the source of a copy is unchanged, so only --find-copies-harder sees it
         Some(original) => self.run(&[
            "diff",
            "--cached",
            "-M",
            "-C",
            "--find-copies-harder",
            "--numstat",
            "--",
            original,
            path,
         ]),
         None => self.run(&["diff", "--cached", "--numstat", "--", path]),
      }
   }

   fn diff_stats_against_empty(&self, path: &str) -> Result<String> {
      // --no-index exits with 1 when the inputs differ, which they always do here
      self.run_accepting(&["diff", "--no-index", "--numstat", "/dev/null", path], &[0, 1])
   }

   fn current_branch(&self) -> Result<String> {
      self
         .run(&["rev-parse", "--abbrev-ref", "HEAD"])
         .map(|out| out.trim().to_string())
   }
}
