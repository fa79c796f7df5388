//! Terminal styling for the summary report.
//!
//! Respects `NO_COLOR` environment variable and terminal capabilities.

use std::{fmt::Write, sync::OnceLock};

use owo_colors::OwoColorize;

use crate::{analysis::RepositoryAnalysis, status::ChangeRecord};

/// Whether color output is enabled (cached on first call).
static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();

/// Width of headers and separators in the report
pub const REPORT_WIDTH: usize = 60;

/// Check if colors should be used.
pub fn colors_enabled() -> bool {
   *COLOR_ENABLED.get_or_init(|| {
      // NO_COLOR takes precedence (https://no-color.org/)
      if std::env::var("NO_COLOR").is_ok() {
         return false;
      }
      supports_color::on(supports_color::Stream::Stdout).is_some_and(|level| level.has_basic)
   })
}

// === Color Palette ===

/// Success: additions, complete results (green + bold).
pub fn success(s: &str) -> String {
   if colors_enabled() {
      s.green().bold().to_string()
   } else {
      s.to_string()
   }
}

/// Error: failures, deletions (red + bold).
pub fn error(s: &str) -> String {
   if colors_enabled() {
      s.red().bold().to_string()
   } else {
      s.to_string()
   }
}

/// Info: status codes, group names (cyan).
pub fn info(s: &str) -> String {
   if colors_enabled() {
      s.cyan().to_string()
   } else {
      s.to_string()
   }
}

/// Dim: less important details, file paths (dimmed).
pub fn dim(s: &str) -> String {
   if colors_enabled() {
      s.dimmed().to_string()
   } else {
      s.to_string()
   }
}

/// Bold: headers, key values.
pub fn bold(s: &str) -> String {
   if colors_enabled() {
      s.bold().to_string()
   } else {
      s.to_string()
   }
}

const HORIZONTAL: char = '\u{2500}';

/// Horizontal separator line.
pub fn separator(width: usize) -> String {
   dim(&HORIZONTAL.to_string().repeat(width))
}

/// Section header with decorative lines.
pub fn section_header(title: &str, width: usize) -> String {
   let title_len = title.chars().count();
   let line_len = (width.saturating_sub(title_len + 2)) / 2;
   let line = HORIZONTAL.to_string().repeat(line_len);
   format!("{} {} {}", dim(&line), bold(title), dim(&line))
}

// === Status Icons ===

pub mod icons {
   pub const SUCCESS: &str = "\u{2713}";
   pub const ERROR: &str = "\u{2717}";
   pub const ARROW: &str = "\u{2192}";
   pub const BULLET: &str = "\u{2022}";
}

/// Two-letter porcelain code
fn status_code(record: &ChangeRecord) -> String {
   format!("{}{}", record.staged_status.code(), record.unstaged_status.code())
}

fn change_line(record: &ChangeRecord) -> String {
   let mut line = format!("  {} ", info(&status_code(record)));
   if let Some(original) = &record.original_path {
      let _ = write!(line, "{} {} ", dim(original), icons::ARROW);
   }
   line.push_str(&record.path);
   match record.line_changes {
      Some(changes) => {
         let _ = write!(
            line,
            "  {} {}",
            success(&format!("+{}", changes.added)),
            error(&format!("-{}", changes.deleted))
         );
      },
      None => {
         let _ = write!(line, "  {}", dim(record.file_kind.as_str()));
      },
   }
   line
}

/// Render the human-readable report for one analysis
pub fn render_summary(analysis: &RepositoryAnalysis) -> String {
   let mut out = String::new();
   let _ = writeln!(out, "{}", section_header("Repository Analysis", REPORT_WIDTH));
   let _ = writeln!(out, "{} {}", bold("Repository:"), analysis.repo_path);

   if let Some(message) = &analysis.error {
      let _ = writeln!(out, "{} {}", error(icons::ERROR), error(message));
      out.push_str(&separator(REPORT_WIDTH));
      return out;
   }

   if let Some(branch) = &analysis.branch {
      let _ = writeln!(out, "{} {branch}", bold("Branch:"));
   }
   let _ = writeln!(
      out,
      "{} {} files, {} lines",
      bold("Changes:"),
      analysis.total_files_changed,
      analysis.total_lines_changed
   );

   if analysis.changes.is_empty() {
      let _ = writeln!(out, "{} Working tree clean", success(icons::SUCCESS));
      out.push_str(&separator(REPORT_WIDTH));
      return out;
   }

   let _ = writeln!(out, "\n{}", section_header("Changes", REPORT_WIDTH));
   for record in &analysis.changes {
      let _ = writeln!(out, "{}", change_line(record));
   }

   let _ = writeln!(out, "\n{}", section_header("Directories", REPORT_WIDTH));
   for summary in &analysis.directory_summaries {
      let path = if summary.path.is_empty() { "." } else { summary.path.as_str() };
      let extensions = summary
         .extension_counts
         .iter()
         .map(|(ext, n)| format!("{ext} x{n}"))
         .collect::<Vec<_>>()
         .join(", ");
      let _ = writeln!(
         out,
         "  {} {}  {} files, {} lines  {}",
         icons::BULLET,
         bold(path),
         summary.file_count,
         summary.total_line_changes,
         dim(&format!("({extensions})"))
      );
   }

   let groups = &analysis.pattern_groups.logical_groups;
   if !groups.is_empty() {
      let _ = writeln!(out, "\n{}", section_header("Groups", REPORT_WIDTH));
      for group in groups {
         let _ = writeln!(out, "  {} {}  {} files", icons::BULLET, info(&group.name), group.count);
      }
   }

   out.push_str(&separator(REPORT_WIDTH));
   out
}
