//! Shared helpers: a scripted browser and scratch site roots
#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::fs;
use std::net::{Ipv4Addr, TcpListener};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use theme_previews::{
    Browser, BrowserLauncher, CaptureConfig, LaunchSettings, Page, PreviewError, Result,
    RunOptions, Viewport,
};

/// What the fake browser was asked to do
#[derive(Debug, Default)]
pub struct FakeLog {
    pub launches: usize,
    pub pages_opened: usize,
    pub pages_closed: usize,
    pub open_pages: usize,
    pub max_open_pages: usize,
    pub visited: Vec<String>,
    pub browser_closed: bool,
}

/// Browser stand-in that fetches pages from the live server and renders a
/// solid-colour JPEG
#[derive(Clone, Default)]
pub struct FakeChrome {
    pub log: Arc<Mutex<FakeLog>>,
    pub launch_error: Option<String>,
    /// Themes whose navigation times out
    pub stalled: Vec<String>,
    /// Themes whose render comes back as garbage
    pub corrupt: Vec<String>,
}

impl FakeChrome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_launch(message: &str) -> Self {
        Self {
            launch_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn stalling_on(themes: &[&str]) -> Self {
        Self {
            stalled: themes.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, FakeLog> {
        self.log.lock().unwrap()
    }

    fn matches(list: &[String], url: &str) -> bool {
        list.iter().any(|theme| url.ends_with(&format!("/{theme}/")))
    }
}

impl BrowserLauncher for FakeChrome {
    type Browser = FakeBrowser;

    fn launch(&self, _settings: &LaunchSettings) -> Result<FakeBrowser> {
        self.log().launches += 1;
        if let Some(message) = &self.launch_error {
            return Err(PreviewError::Browser(message.clone()));
        }
        Ok(FakeBrowser {
            chrome: self.clone(),
        })
    }
}

pub struct FakeBrowser {
    chrome: FakeChrome,
}

impl Browser for FakeBrowser {
    type Page = FakePage;

    fn new_page(&self, viewport: Viewport) -> Result<FakePage> {
        let mut log = self.chrome.log();
        log.pages_opened += 1;
        log.open_pages += 1;
        log.max_open_pages = log.max_open_pages.max(log.open_pages);
        Ok(FakePage {
            chrome: self.chrome.clone(),
            viewport,
            url: Mutex::new(String::new()),
        })
    }

    fn close(self) -> Result<()> {
        self.chrome.log().browser_closed = true;
        Ok(())
    }
}

pub struct FakePage {
    chrome: FakeChrome,
    viewport: Viewport,
    url: Mutex<String>,
}

impl Page for FakePage {
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        self.chrome.log().visited.push(url.to_string());
        *self.url.lock().unwrap() = url.to_string();

        if FakeChrome::matches(&self.chrome.stalled, url) {
            return Err(PreviewError::Navigation(format!(
                "Navigation timed out after {}s",
                timeout.as_secs()
            )));
        }

        let response = ureq::get(url)
            .call()
            .map_err(|e| PreviewError::Navigation(e.to_string()))?;
        if response.status() != 200 {
            return Err(PreviewError::Navigation(format!("HTTP {}", response.status())));
        }
        Ok(())
    }

    fn capture_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        if FakeChrome::matches(&self.chrome.corrupt, &self.url.lock().unwrap()) {
            return Ok(b"definitely not a jpeg".to_vec());
        }
        Ok(solid_jpeg(self.viewport, quality))
    }

    fn close(self) -> Result<()> {
        let mut log = self.chrome.log();
        log.open_pages -= 1;
        log.pages_closed += 1;
        Ok(())
    }
}

pub fn solid_jpeg(viewport: Viewport, quality: u8) -> Vec<u8> {
    let image = RgbImage::from_pixel(viewport.width, viewport.height, Rgb([32, 96, 160]));
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&image)
        .unwrap();
    bytes
}

/// Site root with `<theme>/index.html` for each name
pub fn site_with(themes: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for theme in themes {
        add_theme(dir.path(), theme);
    }
    dir
}

pub fn add_theme(root: &Path, theme: &str) {
    let theme_dir = root.join(theme);
    fs::create_dir_all(theme_dir.join("css")).unwrap();
    fs::write(
        theme_dir.join("index.html"),
        format!("<html><head><link rel=\"stylesheet\" href=\"css/site.css\"></head><body><h1>{theme}</h1></body></html>"),
    )
    .unwrap();
    fs::write(theme_dir.join("css/site.css"), "h1 { color: teal; }").unwrap();
}

/// Small viewport so the fake JPEGs stay cheap
pub fn options(root: &Path) -> RunOptions {
    let viewport = Viewport::new(64, 48);
    let mut capture = CaptureConfig::new(root.join("_previews"));
    capture.viewport = viewport;

    RunOptions {
        root: root.to_path_buf(),
        manifest: None,
        preferred_port: 0,
        capture,
        launch: LaunchSettings {
            viewport,
            ..LaunchSettings::default()
        },
    }
}

/// Whether `port` can be bound again within a couple of seconds
///
/// The listener is released by a background accept thread, so allow it a
/// moment to notice.
pub fn port_released(port: u16) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Hold `count` consecutive loopback ports; returns the first one
pub fn occupy_ports(count: u16) -> (u16, Vec<TcpListener>) {
    for _ in 0..50 {
        let scout = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let first = scout.local_addr().unwrap().port();
        drop(scout);
        if first.checked_add(count).is_none() {
            continue;
        }

        let held: Vec<TcpListener> = (first..first + count)
            .map_while(|port| TcpListener::bind((Ipv4Addr::LOCALHOST, port)).ok())
            .collect();
        if held.len() == usize::from(count) {
            return (first, held);
        }
    }
    panic!("could not reserve {count} consecutive ports");
}
