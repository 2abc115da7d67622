//! # Theme Previews
//!
//! Thumbnail capture for every theme variant of a generated static site.
//!
//! A run serves the site root over a loopback-only HTTP server, works out
//! which subdirectories are themes, then loads each theme's page in a
//! headless browser and writes `<out>/<theme>.jpg`.
//!
//! ## Pipeline
//!
//! - [`StaticServer`] serves the root on `127.0.0.1`, probing upward from the
//!   preferred port when it is taken
//! - [`themes::resolve`] reads the manifest or probes `<root>/<theme>/index.html`
//! - [`Orchestrator`] captures themes one at a time; a failed theme never
//!   stops the others
//! - [`Runner`] owns the server and browser and always tears both down
//!
//! ## Usage
//!
//! ```rust,no_run
//! use theme_previews::{ChromeLauncher, Cli, Reporter, Runner};
//! use clap::Parser;
//!
//! let cli = Cli::parse_from(["theme-previews", "_site"]);
//! let reporter = Reporter::new(cli.report);
//! let report = Runner::new(cli.into_options()).run(&ChromeLauncher, |r| reporter.emit(r));
//! std::process::exit(report.exit_code);
//! ```

pub mod browser;
pub mod capture;
pub mod chrome;
pub mod config;
pub mod content_type;
pub mod report;
pub mod runner;
pub mod server;
pub mod themes;
mod types;

pub use browser::{Browser, BrowserLauncher, LaunchSettings, Page};
pub use capture::Orchestrator;
pub use chrome::ChromeLauncher;
pub use config::Cli;
pub use report::{ReportFormat, Reporter};
pub use runner::{RunOptions, RunReport, RunState, Runner};
pub use server::StaticServer;
pub use themes::{ThemeId, ThemeList};
pub use types::{CaptureConfig, CaptureOutcome, CaptureResult, Viewport};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("No free port on 127.0.0.1 in {first}..={last}")]
    PortsExhausted { first: u16, last: u16 },

    #[error("Failed to bind 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "No themes found. Ensure a themes manifest exists or {} contains theme directories",
        root.display()
    )]
    NoThemes { root: PathBuf },

    #[error("Invalid theme id: {0:?}")]
    InvalidTheme(String),

    #[error("Navigation error: {0}")]
    Navigation(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Teardown error: {0}")]
    Teardown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PreviewError>;
