//! Theme Previews CLI
//!
//! A thin glue layer over the capture runner.

use clap::Parser;
use std::process::ExitCode;
use theme_previews::{ChromeLauncher, Cli, Reporter, Runner};
use tracing::info;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let reporter = Reporter::new(cli.report);
    let options = cli.into_options();

    info!(
        root = %options.root.display(),
        out = %options.capture.output_dir.display(),
        "Starting theme preview capture"
    );

    let report = Runner::new(options).run(&ChromeLauncher, |result| reporter.emit(result));

    if report.exit_code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
