//! Static file server with byte ranges, gzip negotiation, directory
//! listings, virtual hosting and `/stats` counters.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::path::Path;

pub mod cache;
pub mod compress;
pub mod config;
pub mod demo;
pub mod error;
pub mod handler;
pub mod http;
pub mod index;
pub mod range;
pub mod resolve;
pub mod server;
pub mod stats;
pub mod tls;

pub use cache::ResponseCache;
pub use compress::Encoding;
pub use config::{Args, FsConfig};
pub use error::{ServeError, StartupError};
pub use handler::App;
pub use http::{Body, Request, Response};
pub use range::RangeSpec;
pub use resolve::Resolved;
pub use stats::Stats;

static MIME_TYPES: Lazy<FxHashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("html", "text/html; charset=utf-8"),
        ("htm", "text/html; charset=utf-8"),
        ("css", "text/css; charset=utf-8"),
        ("js", "text/javascript; charset=utf-8"),
        ("mjs", "text/javascript; charset=utf-8"),
        ("json", "application/json; charset=utf-8"),
        ("xml", "application/xml; charset=utf-8"),
        ("txt", "text/plain; charset=utf-8"),
        ("md", "text/markdown; charset=utf-8"),
        ("csv", "text/csv; charset=utf-8"),
        ("ico", "image/x-icon"),
        ("png", "image/png"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("gif", "image/gif"),
        ("webp", "image/webp"),
        ("svg", "image/svg+xml"),
        ("pdf", "application/pdf"),
        ("zip", "application/zip"),
        ("gz", "application/gzip"),
        ("wasm", "application/wasm"),
        ("mp3", "audio/mpeg"),
        ("mp4", "video/mp4"),
        ("webm", "video/webm"),
        ("woff", "font/woff"),
        ("woff2", "font/woff2"),
        ("ttf", "font/ttf"),
        ("eot", "application/vnd.ms-fontobject"),
    ]
    .into_iter()
    .collect()
});

/// Content type for a served file, derived from its extension.
pub fn get_mime_type(file_path: &Path) -> &'static str {
    file_path
        .extension()
        .and_then(|s| s.to_str())
        .and_then(|ext| MIME_TYPES.get(ext.to_ascii_lowercase().as_str()).copied())
        .unwrap_or("application/octet-stream")
}
