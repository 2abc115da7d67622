//! Command line options and environment detection

use crate::browser::LaunchSettings;
use crate::report::ReportFormat;
use crate::runner::RunOptions;
use crate::types::{CaptureConfig, Viewport};
use clap::Parser;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ROOT: &str = "_site";
pub const DEFAULT_MANIFEST: &str = ".themes.txt";
pub const DEFAULT_PORT: u16 = 5520;

/// Output directory name under the root when `--out` is not given
pub const DEFAULT_OUT_DIR: &str = "_previews";

/// Variables that mark a CI container when set to `true`
const CI_VARIABLES: [&str; 2] = ["CI", "GITHUB_ACTIONS"];

/// Capture a JPEG preview for every theme of a static site
#[derive(Parser, Debug)]
#[command(name = "theme-previews")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Site root containing one directory per theme
    #[arg(value_name = "ROOT", conflicts_with = "root")]
    pub root_positional: Option<PathBuf>,

    /// Site root (same as the positional argument)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Output directory for previews [default: <ROOT>/_previews]
    #[arg(long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Manifest listing themes, one per line
    #[arg(long, value_name = "FILE", default_value = DEFAULT_MANIFEST)]
    pub themes: PathBuf,

    /// Viewport width
    #[arg(long, default_value_t = 1200, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,

    /// Viewport height
    #[arg(long, default_value_t = 800, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,

    /// JPEG quality (0-100)
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: u8,

    /// Preferred port for the local server
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Extra wait after the page goes idle, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub delay: u64,

    /// Navigation timeout per theme, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub timeout: u64,

    /// Chrome or Chromium executable
    #[arg(long, value_name = "PATH", env = "CHROME")]
    pub chrome: Option<PathBuf>,

    /// Result output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,
}

impl Cli {
    /// Resolve defaults and turn the flags into run options
    pub fn into_options(self) -> RunOptions {
        let disable_sandbox = ci_detected(|key| env::var(key).ok());
        self.into_options_with(disable_sandbox)
    }

    fn into_options_with(self, disable_sandbox: bool) -> RunOptions {
        let root = self
            .root
            .or(self.root_positional)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT));
        let output_dir = self.out.unwrap_or_else(|| root.join(DEFAULT_OUT_DIR));
        let viewport = Viewport::new(self.width, self.height);
        let navigation_timeout = Duration::from_secs(self.timeout);
        let delay = Duration::from_millis(self.delay);

        let capture = CaptureConfig {
            viewport,
            jpeg_quality: self.quality,
            delay,
            navigation_timeout,
            output_dir,
        };

        let launch = LaunchSettings {
            viewport,
            disable_sandbox,
            executable: self.chrome,
            // No CDP traffic flows while a theme sleeps through its delay
            idle_timeout: navigation_timeout + delay + Duration::from_secs(30),
        };

        RunOptions {
            root,
            manifest: Some(self.themes),
            preferred_port: self.port,
            capture,
            launch,
        }
    }
}

/// Whether we are running in a CI container that needs the sandbox disabled
pub fn ci_detected(lookup: impl Fn(&str) -> Option<String>) -> bool {
    CI_VARIABLES
        .into_iter()
        .any(|key| lookup(key).is_some_and(|value| value == "true"))
}
