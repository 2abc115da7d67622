//! Theme discovery
//!
//! A theme list comes from an explicit manifest when one is present and
//! non-empty, otherwise from probing `<root>/<name>/index.html`.

use crate::{PreviewError, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Directories starting with this are never themes (`_previews`, `_drafts`)
pub const INTERNAL_PREFIX: char = '_';

/// Name of one site variant
///
/// Always non-empty and free of anything that could escape the output
/// directory or the served root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ThemeId(String);

impl ThemeId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let invalid = id.is_empty()
            || id == "."
            || id.contains("..")
            || id.contains(['/', '\\', '\0']);
        if invalid {
            return Err(PreviewError::InvalidTheme(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ThemeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered themes for one run; the order is the capture order
pub type ThemeList = Vec<ThemeId>;

/// Resolve the themes to capture
///
/// An absent manifest, or one with no usable lines, falls through to
/// directory probing. An empty result is [`PreviewError::NoThemes`].
pub fn resolve(manifest: Option<&Path>, root: &Path) -> Result<ThemeList> {
    if let Some(path) = manifest.filter(|p| p.exists()) {
        let themes = read_manifest(path)?;
        if !themes.is_empty() {
            debug!(manifest = %path.display(), count = themes.len(), "themes from manifest");
            return Ok(themes);
        }
        debug!(manifest = %path.display(), "manifest has no themes, probing directories");
    }

    let themes = probe_directories(root)?;
    if themes.is_empty() {
        return Err(PreviewError::NoThemes {
            root: root.to_path_buf(),
        });
    }

    debug!(root = %root.display(), count = themes.len(), "themes from directory probe");
    Ok(themes)
}

/// Read a manifest: one theme per line, blank and `#` lines ignored
pub fn read_manifest(path: &Path) -> Result<ThemeList> {
    let text = fs::read_to_string(path)?;
    Ok(parse_manifest(&text))
}

fn parse_manifest(text: &str) -> ThemeList {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match ThemeId::new(line) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "skipping manifest entry");
                None
            }
        })
        .collect()
}

/// Immediate subdirectories of `root` that carry an `index.html`, by name
pub fn probe_directories(root: &Path) -> Result<ThemeList> {
    let mut names = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let Ok(name) = entry.file_name().into_string() else {
            debug!(path = %entry.path().display(), "skipping non UTF-8 directory name");
            continue;
        };
        if name.starts_with(INTERNAL_PREFIX) {
            continue;
        }
        if !entry.path().join("index.html").is_file() {
            continue;
        }

        match ThemeId::new(name) {
            Ok(id) => names.push(id),
            Err(e) => debug!(error = %e, "skipping directory"),
        }
    }

    names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(names)
}
