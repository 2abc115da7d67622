//! Loopback HTTP server for the site root
//!
//! This server is NOT a daemon. It:
//! - Binds 127.0.0.1 only, walking up from the preferred port on conflict
//! - Serves files read-only from one root directory
//! - Lives exactly as long as the run that started it

use crate::content_type::content_type_for;
use crate::{PreviewError, Result};
use percent_encoding::percent_decode_str;
use std::fs::{self, File};
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tiny_http::{Header, Request, Response, ResponseBox, Server};
use tracing::{debug, error, warn};
use url::Url;

/// Extra ports tried after the preferred one
pub const PORT_RETRIES: u16 = 20;

/// Threads pulling requests off the shared server
const WORKERS: usize = 4;

/// Running static file server
pub struct StaticServer {
    server: Arc<Server>,
    port: u16,
    base_url: Url,
    listening: bool,
    stopping: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl StaticServer {
    /// Bind a loopback port and start serving `root`
    ///
    /// Tries `preferred_port` through `preferred_port + PORT_RETRIES`. Only
    /// "address in use" moves on to the next port; any other bind error is
    /// returned straight away.
    pub fn start(root: impl Into<PathBuf>, preferred_port: u16) -> Result<Self> {
        let root = root.into();
        let listener = bind_loopback(preferred_port)?;
        let port = listener.local_addr()?.port();
        let base_url = Url::parse(&format!("http://127.0.0.1:{port}/"))
            .map_err(|e| PreviewError::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let server = Server::from_listener(listener, None)
            .map_err(|e| PreviewError::Io(io::Error::other(e.to_string())))?;
        let server = Arc::new(server);
        let stopping = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(WORKERS);
        for index in 0..WORKERS {
            let server = Arc::clone(&server);
            let stopping = Arc::clone(&stopping);
            let root = root.clone();
            let handle = thread::Builder::new()
                .name(format!("static-server-{index}"))
                .spawn(move || worker_loop(&server, &root, &stopping))?;
            workers.push(handle);
        }

        debug!(port, root = %root.display(), "static server listening");

        Ok(Self {
            server,
            port,
            base_url,
            listening: true,
            stopping,
            workers,
        })
    }

    /// Port actually bound
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Base URL, always with a trailing slash
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Stop accepting requests and release the port
    ///
    /// Waits for in-flight requests to finish before returning.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if !self.listening {
            return Ok(());
        }
        self.listening = false;
        self.stopping.store(true, Ordering::SeqCst);

        // One unblock per worker parked in recv()
        for _ in 0..self.workers.len() {
            self.server.unblock();
        }

        let mut panicked = 0;
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        debug!(port = self.port, "static server stopped");

        if panicked > 0 {
            return Err(PreviewError::Teardown(format!(
                "{panicked} static server worker(s) panicked"
            )));
        }
        Ok(())
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "static server shutdown failed");
        }
    }
}

fn bind_loopback(preferred_port: u16) -> Result<TcpListener> {
    let last = preferred_port.saturating_add(PORT_RETRIES);

    for port in preferred_port..=last {
        match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                debug!(port, "port in use, trying next");
            }
            Err(source) => return Err(PreviewError::Bind { port, source }),
        }
    }

    Err(PreviewError::PortsExhausted {
        first: preferred_port,
        last,
    })
}

fn worker_loop(server: &Server, root: &Path, stopping: &AtomicBool) {
    loop {
        match server.recv() {
            Ok(request) => serve(root, request),
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                debug!(error = %e, "failed to receive request");
            }
        }
    }
}

/// Where a request path leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Decoded path tried to climb out of the root, or did not decode
    BadRequest,
    NotFound,
    File(PathBuf),
}

/// Map a raw request URL onto a file under `root`
///
/// Accepts origin-form (`/alpha/`) and absolute-form
/// (`http://127.0.0.1:5520/alpha/`) targets. The path is percent-decoded once
/// and rejected if the decoded form contains `..` anywhere. Directories
/// resolve to their `index.html`.
pub fn resolve_request(root: &Path, raw_url: &str) -> Resolution {
    let path = request_path(raw_url)
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let decoded = match percent_decode_str(path).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => return Resolution::BadRequest,
    };
    if decoded.contains("..") {
        return Resolution::BadRequest;
    }

    let mut target = root.to_path_buf();
    for segment in decoded.split(['/', '\\']).filter(|s| !s.is_empty() && *s != ".") {
        target.push(segment);
    }

    let Ok(meta) = fs::metadata(&target) else {
        return Resolution::NotFound;
    };
    if meta.is_dir() {
        target.push("index.html");
        match fs::metadata(&target) {
            Ok(meta) if meta.is_file() => {}
            _ => return Resolution::NotFound,
        }
    }

    Resolution::File(target)
}

/// Path part of a request target, still percent-encoded
///
/// Scheme and authority are cut by hand: `Url::parse` would collapse `..`
/// segments before they could be rejected.
fn request_path(raw_url: &str) -> &str {
    let Some((scheme, rest)) = raw_url.split_once("://") else {
        return raw_url;
    };
    if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
        return raw_url;
    }
    match rest.find(['/', '?', '#']) {
        Some(index) if rest[index..].starts_with('/') => &rest[index..],
        _ => "/",
    }
}

/// Per-request failure that maps to a 500
#[derive(Error, Debug)]
enum ServeError {
    #[error("invalid header {0}")]
    Header(&'static str),
}

fn serve(root: &Path, request: Request) {
    let url = request.url().to_owned();
    let response = guarded(&url, || respond(root, &url));

    if let Err(e) = request.respond(response) {
        debug!(%url, error = %e, "client went away before the response was sent");
    }
}

/// Run a handler, turning its errors and panics into a 500
fn guarded<F>(url: &str, handler: F) -> ResponseBox
where
    F: FnOnce() -> std::result::Result<ResponseBox, ServeError>,
{
    match panic::catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            warn!(%url, error = %e, "request failed");
            status_response(500, "Server error")
        }
        Err(_) => {
            error!(%url, "request handler panicked");
            status_response(500, "Server error")
        }
    }
}

fn respond(root: &Path, url: &str) -> std::result::Result<ResponseBox, ServeError> {
    let path = match resolve_request(root, url) {
        Resolution::BadRequest => return Ok(status_response(400, "Bad request")),
        Resolution::NotFound => return Ok(status_response(404, "Not found")),
        Resolution::File(path) => path,
    };

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable file");
            return Ok(status_response(404, "Not found"));
        }
    };

    let content_type = Header::from_bytes(&b"Content-Type"[..], content_type_for(&path).as_bytes())
        .map_err(|_| ServeError::Header("Content-Type"))?;
    let cache_control = Header::from_bytes(&b"Cache-Control"[..], &b"no-store"[..])
        .map_err(|_| ServeError::Header("Cache-Control"))?;

    Ok(Response::from_file(file)
        .with_status_code(200)
        .with_header(content_type)
        .with_header(cache_control)
        .boxed())
}

fn status_response(code: u16, body: &str) -> ResponseBox {
    Response::from_string(body).with_status_code(code).boxed()
}
