//! File extension to MIME type lookup for the static server

use std::path::Path;

/// Fallback for anything not in the table
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Content type for a file path, keyed on its extension
pub fn content_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(content_type_for_extension)
        .unwrap_or(OCTET_STREAM)
}

/// Content type for a bare extension (no leading dot), case-insensitive
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        _ => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        let table = [
            ("html", "text/html; charset=utf-8"),
            ("css", "text/css; charset=utf-8"),
            ("js", "application/javascript; charset=utf-8"),
            ("json", "application/json; charset=utf-8"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("webp", "image/webp"),
            ("svg", "image/svg+xml"),
            ("ico", "image/x-icon"),
            ("woff", "font/woff"),
            ("woff2", "font/woff2"),
            ("ttf", "font/ttf"),
            ("otf", "font/otf"),
            ("map", "application/json"),
        ];

        for (ext, expected) in table {
            assert_eq!(content_type_for_extension(ext), expected, "extension {ext}");
        }
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(content_type_for_extension("HTML"), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("logo.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("a/b/Photo.JpEg")), "image/jpeg");
    }

    #[test]
    fn test_unknown_falls_back_to_octet_stream() {
        assert_eq!(content_type_for_extension("exe"), OCTET_STREAM);
        assert_eq!(content_type_for(Path::new("README")), OCTET_STREAM);
        assert_eq!(content_type_for(Path::new("archive.tar.gz")), OCTET_STREAM);
    }
}
