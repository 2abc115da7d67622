//! Sequential per-theme screenshot capture
//!
//! Themes are captured one at a time. Each gets its own page, which is closed
//! before the next theme starts whatever happened on it.

use crate::browser::{Browser, Page};
use crate::themes::ThemeId;
use crate::types::{CaptureConfig, CaptureOutcome, CaptureResult};
use crate::{PreviewError, Result};
use image::{ImageFormat, ImageReader};
use std::fs;
use std::io::Cursor;
use std::thread;
use tracing::{debug, info, warn};
use url::Url;

/// Drives one browser through a list of themes
pub struct Orchestrator<'a, B: Browser> {
    browser: &'a B,
    base_url: Url,
    config: &'a CaptureConfig,
}

impl<'a, B: Browser> Orchestrator<'a, B> {
    pub fn new(browser: &'a B, base_url: Url, config: &'a CaptureConfig) -> Self {
        Self {
            browser,
            base_url,
            config,
        }
    }

    /// Capture every theme in order
    ///
    /// `on_result` sees each result as soon as its theme is done. A failed
    /// theme is reported and the loop moves on.
    pub fn capture_all(
        &self,
        themes: &[ThemeId],
        mut on_result: impl FnMut(&CaptureResult),
    ) -> Vec<CaptureResult> {
        let mut results = Vec::with_capacity(themes.len());

        for theme in themes {
            let result = self.capture_theme(theme);
            on_result(&result);
            results.push(result);
        }

        let captured = results.iter().filter(|r| r.is_success()).count();
        info!(
            captured,
            failed = results.len() - captured,
            "capture loop finished"
        );
        results
    }

    /// Capture a single theme on a fresh page
    pub fn capture_theme(&self, theme: &ThemeId) -> CaptureResult {
        let outcome = self.browser.new_page(self.config.viewport).and_then(|page| {
            let outcome = self.capture_on(&page, theme);
            if let Err(e) = page.close() {
                warn!(%theme, error = %e, "failed to close page");
            }
            outcome
        });

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(%theme, error = %e, "capture failed");
                CaptureOutcome::Failure {
                    message: e.to_string(),
                }
            }
        };

        CaptureResult::new(theme.clone(), outcome)
    }

    fn capture_on(&self, page: &B::Page, theme: &ThemeId) -> Result<CaptureOutcome> {
        let url = theme_url(&self.base_url, theme)?;
        debug!(%theme, %url, "navigating");
        page.navigate(url.as_str(), self.config.navigation_timeout)?;

        if !self.config.delay.is_zero() {
            debug!(%theme, delay_ms = self.config.delay.as_millis(), "settling");
            thread::sleep(self.config.delay);
        }

        let jpeg = page.capture_jpeg(self.config.jpeg_quality)?;
        let (width, height) = jpeg_dimensions(&jpeg)?;

        let path = self.config.output_path(theme);
        fs::write(&path, &jpeg)?;
        debug!(%theme, path = %path.display(), width, height, "preview written");

        Ok(CaptureOutcome::Success {
            path,
            width,
            height,
        })
    }
}

/// `<base>/<encoded theme>/`; the trailing slash makes the server pick the index
pub fn theme_url(base_url: &Url, theme: &ThemeId) -> Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| PreviewError::Navigation(format!("Cannot append to base URL {base_url}")))?
        .pop_if_empty()
        .push(theme.as_str())
        .push("");
    Ok(url)
}

fn jpeg_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::with_format(Cursor::new(bytes), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| PreviewError::Capture(format!("Browser did not return a JPEG: {e}")))
}
