//! Run lifecycle: server, themes, browser, capture, teardown
//!
//! ```text
//! Init → ServerStarting → ThemesResolving → BrowserLaunching → Capturing
//!                                                                 ↓
//!                                          Done(code) ← TearingDown
//! ```
//!
//! Once the server is up every path goes through `TearingDown`, which closes
//! the browser and then the server exactly once. The exit code is 0 only if
//! the capture loop ran to the end.

use crate::browser::{Browser, BrowserLauncher, LaunchSettings};
use crate::capture::Orchestrator;
use crate::server::StaticServer;
use crate::themes;
use crate::types::{CaptureConfig, CaptureResult};
use crate::Result;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, warn};
use url::Url;

/// Immutable inputs for one run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory served over HTTP and probed for themes
    pub root: PathBuf,

    /// Optional theme manifest
    pub manifest: Option<PathBuf>,

    pub preferred_port: u16,

    pub capture: CaptureConfig,

    pub launch: LaunchSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ServerStarting,
    ThemesResolving,
    BrowserLaunching,
    Capturing,
    TearingDown,
    Done(i32),
}

/// What a finished run looked like
#[derive(Debug)]
pub struct RunReport {
    pub exit_code: i32,

    /// Port the server bound, if it got that far
    pub port: Option<u16>,

    pub results: Vec<CaptureResult>,

    /// Every state the run passed through, in order
    pub states: Vec<RunState>,
}

pub struct Runner {
    options: RunOptions,
    states: Vec<RunState>,
}

/// Resources that must be released on the way out
struct Resources<B> {
    server: Option<StaticServer>,
    browser: Option<B>,
}

impl<B: Browser> Resources<B> {
    /// Close the browser, then the server. Failures are logged only.
    fn tear_down(&mut self) {
        if let Some(browser) = self.browser.take() {
            if let Err(e) = browser.close() {
                warn!(error = %e, "failed to close browser");
            }
        }
        if let Some(server) = self.server.take() {
            if let Err(e) = server.stop() {
                warn!(error = %e, "failed to stop static server");
            }
        }
    }
}

impl Runner {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            states: vec![RunState::Init],
        }
    }

    fn state(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Init)
    }

    /// Run to completion, handing each capture result to `on_result`
    pub fn run<L: BrowserLauncher>(
        mut self,
        launcher: &L,
        mut on_result: impl FnMut(&CaptureResult),
    ) -> RunReport {
        if let Err(e) = self.prepare_directories() {
            error!(error = %e, "failed to prepare directories");
            return self.finish(1, None, Vec::new());
        }

        self.enter(RunState::ServerStarting);
        let server = match StaticServer::start(&self.options.root, self.options.preferred_port) {
            Ok(server) => server,
            Err(e) => {
                error!(error = %e, "failed to start static server");
                return self.finish(1, None, Vec::new());
            }
        };
        let port = server.port();
        let base_url = server.base_url().clone();

        let mut resources = Resources {
            server: Some(server),
            browser: None,
        };
        let outcome = self.drive(launcher, base_url, &mut resources, &mut on_result);

        self.enter(RunState::TearingDown);
        resources.tear_down();

        match outcome {
            Ok(results) => self.finish(0, Some(port), results),
            Err(e) => {
                error!(error = %e, "run aborted");
                self.finish(1, Some(port), Vec::new())
            }
        }
    }

    fn prepare_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.options.root)?;
        fs::create_dir_all(&self.options.capture.output_dir)?;
        Ok(())
    }

    fn drive<L: BrowserLauncher>(
        &mut self,
        launcher: &L,
        base_url: Url,
        resources: &mut Resources<L::Browser>,
        on_result: &mut impl FnMut(&CaptureResult),
    ) -> Result<Vec<CaptureResult>> {
        self.enter(RunState::ThemesResolving);
        let themes = themes::resolve(self.options.manifest.as_deref(), &self.options.root)?;
        debug!(count = themes.len(), "themes resolved");

        self.enter(RunState::BrowserLaunching);
        let browser = resources
            .browser
            .insert(launcher.launch(&self.options.launch)?);

        self.enter(RunState::Capturing);
        let orchestrator = Orchestrator::new(&*browser, base_url, &self.options.capture);
        Ok(orchestrator.capture_all(&themes, on_result))
    }

    fn enter(&mut self, state: RunState) {
        debug!(from = ?self.state(), to = ?state, "run state");
        self.states.push(state);
    }

    fn finish(mut self, exit_code: i32, port: Option<u16>, results: Vec<CaptureResult>) -> RunReport {
        self.enter(RunState::Done(exit_code));
        RunReport {
            exit_code,
            port,
            results,
            states: self.states,
        }
    }
}
