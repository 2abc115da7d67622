//! Core types for a capture run

use crate::themes::ThemeId;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Navigation budget per theme
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Browser viewport in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1200, 800)
    }
}

/// Settings shared by every capture in a run
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Viewport size
    pub viewport: Viewport,

    /// JPEG quality, 0..=100
    pub jpeg_quality: u8,

    /// Settle time after the network goes idle
    pub delay: Duration,

    /// Per-navigation timeout
    pub navigation_timeout: Duration,

    /// Where `<theme>.jpg` files are written
    pub output_dir: PathBuf,
}

impl CaptureConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            viewport: Viewport::default(),
            jpeg_quality: 80,
            delay: Duration::ZERO,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            output_dir: output_dir.into(),
        }
    }

    /// Output file for a theme
    pub fn output_path(&self, theme: &ThemeId) -> PathBuf {
        self.output_dir.join(format!("{theme}.jpg"))
    }
}

/// How one theme's capture ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaptureOutcome {
    Success {
        path: PathBuf,
        width: u32,
        height: u32,
    },
    Failure {
        message: String,
    },
}

/// One line of the run report
#[derive(Debug, Clone, Serialize)]
pub struct CaptureResult {
    pub theme: ThemeId,

    #[serde(flatten)]
    pub outcome: CaptureOutcome,

    /// RFC 3339 timestamp of when the capture finished
    pub captured_at: String,
}

impl CaptureResult {
    pub fn new(theme: ThemeId, outcome: CaptureOutcome) -> Self {
        Self {
            theme,
            outcome,
            captured_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CaptureOutcome::Success { .. })
    }
}
