//! Per-theme console lines

use crate::types::{CaptureOutcome, CaptureResult};
use clap::ValueEnum;
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};

/// How results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// One human-readable line per theme
    #[default]
    Text,
    /// One JSON object per theme
    Json,
}

/// Prints each capture result as it arrives
pub struct Reporter {
    format: ReportFormat,
    cwd: Option<PathBuf>,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            cwd: env::current_dir().ok(),
        }
    }

    pub fn emit(&self, result: &CaptureResult) {
        match self.format {
            ReportFormat::Text => match &result.outcome {
                CaptureOutcome::Success { .. } => println!("{}", self.line(result)),
                CaptureOutcome::Failure { .. } => eprintln!("{}", self.line(result)),
            },
            ReportFormat::Json => match serde_json::to_string(result) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("{} {}: {}", "⚠".yellow(), result.theme, e),
            },
        }
    }

    /// Text-mode line for a result
    pub fn line(&self, result: &CaptureResult) -> String {
        match &result.outcome {
            CaptureOutcome::Success { path, .. } => format!(
                "{} Captured preview for {}: {}",
                "✓".green(),
                result.theme,
                self.display_path(path).display()
            ),
            CaptureOutcome::Failure { message } => format!(
                "{} Failed to capture preview for {}: {}",
                "⚠".yellow(),
                result.theme,
                message
            ),
        }
    }

    fn display_path<'p>(&self, path: &'p Path) -> &'p Path {
        self.cwd
            .as_deref()
            .and_then(|cwd| path.strip_prefix(cwd).ok())
            .unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::ThemeId;

    fn reporter_in(cwd: &str) -> Reporter {
        colored::control::set_override(false);
        Reporter {
            format: ReportFormat::Text,
            cwd: Some(PathBuf::from(cwd)),
        }
    }

    #[test]
    fn test_success_line_is_relative() {
        let reporter = reporter_in("/work");
        let result = CaptureResult::new(
            ThemeId::new("ocean").unwrap(),
            CaptureOutcome::Success {
                path: PathBuf::from("/work/_site/_previews/ocean.jpg"),
                width: 1200,
                height: 800,
            },
        );

        assert_eq!(
            reporter.line(&result),
            "✓ Captured preview for ocean: _site/_previews/ocean.jpg"
        );
    }

    #[test]
    fn test_path_outside_cwd_kept_whole() {
        let reporter = reporter_in("/work");
        let result = CaptureResult::new(
            ThemeId::new("ocean").unwrap(),
            CaptureOutcome::Success {
                path: PathBuf::from("/elsewhere/ocean.jpg"),
                width: 1200,
                height: 800,
            },
        );

        assert!(reporter.line(&result).ends_with("/elsewhere/ocean.jpg"));
    }

    #[test]
    fn test_failure_line() {
        let reporter = reporter_in("/work");
        let result = CaptureResult::new(
            ThemeId::new("forest").unwrap(),
            CaptureOutcome::Failure {
                message: "Navigation error: timed out".to_string(),
            },
        );

        assert_eq!(
            reporter.line(&result),
            "⚠ Failed to capture preview for forest: Navigation error: timed out"
        );
    }
}
