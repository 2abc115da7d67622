//! Headless Chrome backend for the browser capability

use crate::browser::{Browser, BrowserLauncher, LaunchSettings, Page, CI_LAUNCH_ARGS};
use crate::types::Viewport;
use crate::{PreviewError, Result};
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::types::Bounds;
use headless_chrome::{LaunchOptions, Tab};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Time between network-idle polls
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Quiet polls needed before the page counts as idle
const IDLE_ROUNDS: u32 = 2;

/// Requests the tab has sent that have neither finished nor failed
#[derive(Debug, Default)]
struct InFlight {
    pending: HashSet<String>,
}

impl InFlight {
    /// Redirects reuse the request id, so a repeat start is not counted twice
    fn started(&mut self, request_id: &str) {
        self.pending.insert(request_id.to_string());
    }

    fn settled(&mut self, request_id: &str) {
        self.pending.remove(request_id);
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Counts consecutive polls with a complete document and nothing in flight
#[derive(Debug, Default)]
struct IdleWatch {
    quiet_rounds: u32,
}

impl IdleWatch {
    /// Returns true once [`IDLE_ROUNDS`] quiet polls have been seen in a row
    fn poll(&mut self, document_complete: bool, in_flight: usize) -> bool {
        if document_complete && in_flight == 0 {
            self.quiet_rounds += 1;
        } else {
            self.quiet_rounds = 0;
        }
        self.quiet_rounds >= IDLE_ROUNDS
    }
}

/// Launches a local Chrome/Chromium
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

impl BrowserLauncher for ChromeLauncher {
    type Browser = ChromeBrowser;

    fn launch(&self, settings: &LaunchSettings) -> Result<ChromeBrowser> {
        let args: Vec<&OsStr> = if settings.disable_sandbox {
            CI_LAUNCH_ARGS.into_iter().map(OsStr::new).collect()
        } else {
            Vec::new()
        };

        let browser = headless_chrome::Browser::new(LaunchOptions {
            headless: true,
            sandbox: !settings.disable_sandbox,
            window_size: Some((settings.viewport.width, settings.viewport.height)),
            path: settings.executable.clone(),
            idle_browser_timeout: settings.idle_timeout,
            args,
            ..Default::default()
        })
        .map_err(|e| PreviewError::Browser(e.to_string()))?;

        debug!(sandbox = !settings.disable_sandbox, "headless chrome launched");
        Ok(ChromeBrowser { browser })
    }
}

pub struct ChromeBrowser {
    browser: headless_chrome::Browser,
}

impl Browser for ChromeBrowser {
    type Page = ChromePage;

    fn new_page(&self, viewport: Viewport) -> Result<ChromePage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| PreviewError::Browser(e.to_string()))?;

        tab.set_bounds(Bounds::Normal {
            left: Some(0),
            top: Some(0),
            width: Some(f64::from(viewport.width)),
            height: Some(f64::from(viewport.height)),
        })
        .map_err(|e| PreviewError::Browser(e.to_string()))?;

        let in_flight = Arc::new(Mutex::new(InFlight::default()));
        let tracker = Arc::clone(&in_flight);
        tab.add_event_listener(Arc::new(move |event: &Event| {
            let Ok(mut requests) = tracker.lock() else {
                return;
            };
            match event {
                Event::NetworkRequestWillBeSent(e) => requests.started(&e.params.request_id),
                Event::NetworkLoadingFinished(e) => requests.settled(&e.params.request_id),
                Event::NetworkLoadingFailed(e) => requests.settled(&e.params.request_id),
                _ => {}
            }
        }))
        .map_err(|e| PreviewError::Browser(e.to_string()))?;

        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })
        .map_err(|e| PreviewError::Browser(e.to_string()))?;

        Ok(ChromePage { tab, in_flight })
    }

    fn close(self) -> Result<()> {
        // Dropping the handle kills the browser process
        drop(self.browser);
        Ok(())
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
    in_flight: Arc<Mutex<InFlight>>,
}

impl ChromePage {
    fn document_complete(&self) -> Result<bool> {
        let value = self
            .tab
            .evaluate("document.readyState", false)
            .map_err(|e| PreviewError::Navigation(e.to_string()))?
            .value
            .ok_or_else(|| PreviewError::Navigation("Empty readyState result".to_string()))?;

        Ok(value.as_str() == Some("complete"))
    }

    fn pending_requests(&self) -> Result<usize> {
        self.in_flight
            .lock()
            .map(|requests| requests.len())
            .map_err(|_| PreviewError::Navigation("Request tracker poisoned".to_string()))
    }

    /// Poll until the document is complete and no request has been in
    /// flight for [`IDLE_ROUNDS`] polls in a row
    fn wait_for_network_idle(&self, deadline: Instant, timeout: Duration) -> Result<()> {
        let mut watch = IdleWatch::default();

        loop {
            let complete = self.document_complete()?;
            let pending = self.pending_requests()?;
            if watch.poll(complete, pending) {
                return Ok(());
            }

            if Instant::now() + IDLE_POLL > deadline {
                return Err(PreviewError::Navigation(format!(
                    "Network did not go idle within {}s ({pending} request(s) pending)",
                    timeout.as_secs()
                )));
            }
            thread::sleep(IDLE_POLL);
        }
    }
}

impl Page for ChromePage {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        self.tab.set_default_timeout(timeout);

        self.tab
            .navigate_to(url)
            .map_err(|e| PreviewError::Navigation(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| PreviewError::Navigation(e.to_string()))?;

        self.wait_for_network_idle(deadline, timeout)
    }

    fn capture_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(
                CaptureScreenshotFormatOption::Jpeg,
                Some(u32::from(quality)),
                None,
                true,
            )
            .map_err(|e| PreviewError::Capture(e.to_string()))
    }

    fn close(self) -> Result<()> {
        self.tab
            .close(true)
            .map(|_| ())
            .map_err(|e| PreviewError::Browser(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_tracks_start_and_settle() {
        let mut requests = InFlight::default();
        requests.started("1");
        requests.started("2");
        assert_eq!(requests.len(), 2);

        requests.settled("1");
        assert_eq!(requests.len(), 1);
        requests.settled("2");
        assert_eq!(requests.len(), 0);
    }

    #[test]
    fn test_redirect_counts_once() {
        let mut requests = InFlight::default();
        requests.started("7");
        requests.started("7");
        requests.settled("7");
        assert_eq!(requests.len(), 0);
    }

    #[test]
    fn test_unknown_settle_ignored() {
        let mut requests = InFlight::default();
        requests.settled("ghost");
        requests.started("1");
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_idle_needs_consecutive_quiet_polls() {
        let mut watch = IdleWatch::default();
        assert!(!watch.poll(true, 0));
        assert!(watch.poll(true, 0));
    }

    #[test]
    fn test_pending_request_resets_idle() {
        let mut watch = IdleWatch::default();
        assert!(!watch.poll(true, 0));
        // A slow font request is still loading even though nothing new finished
        assert!(!watch.poll(true, 1));
        assert!(!watch.poll(true, 1));
        assert!(!watch.poll(true, 0));
        assert!(watch.poll(true, 0));
    }

    #[test]
    fn test_incomplete_document_is_never_idle() {
        let mut watch = IdleWatch::default();
        for _ in 0..5 {
            assert!(!watch.poll(false, 0));
        }
    }
}
