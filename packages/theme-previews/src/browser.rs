//! Browser capability used by the capture loop
//!
//! The orchestration code only needs to open a page, navigate it, render it
//! to JPEG and close it again. Keeping that behind these traits lets the
//! pipeline run against a fake in tests.

use crate::types::Viewport;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Sandbox-related flags for restricted CI containers
pub const CI_LAUNCH_ARGS: [&str; 2] = ["--disable-setuid-sandbox", "--disable-dev-shm-usage"];

/// Everything needed to start a browser
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub viewport: Viewport,

    /// Turn the sandbox off and add [`CI_LAUNCH_ARGS`]
    pub disable_sandbox: bool,

    /// Browser executable; auto-detected when `None`
    pub executable: Option<PathBuf>,

    /// Longest stretch the browser may stay silent before it is considered gone
    pub idle_timeout: Duration,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            disable_sandbox: false,
            executable: None,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

/// Starts a browser
pub trait BrowserLauncher {
    type Browser: Browser;

    fn launch(&self, settings: &LaunchSettings) -> Result<Self::Browser>;
}

/// Running browser; only ever drives one page at a time
pub trait Browser {
    type Page: Page;

    /// Open a fresh page scoped to a single theme
    fn new_page(&self, viewport: Viewport) -> Result<Self::Page>;

    /// Shut the browser down
    fn close(self) -> Result<()>;
}

/// One browsing context
pub trait Page {
    /// Load `url` and wait for the network to go idle, at most `timeout`
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Render the current viewport (not the full page) as JPEG
    fn capture_jpeg(&self, quality: u8) -> Result<Vec<u8>>;

    fn close(self) -> Result<()>;
}
