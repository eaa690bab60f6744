//! Gzip negotiation for static responses.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// Representation variant of a cached file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Identity,
    Gzip,
}

impl Encoding {
    /// Value for the `Content-Encoding` header, if any.
    pub fn header_value(self) -> Option<&'static str> {
        match self {
            Encoding::Identity => None,
            Encoding::Gzip => Some("gzip"),
        }
    }
}

// Formats that are already compressed gain nothing from gzip.
const INCOMPRESSIBLE_PREFIXES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/x-icon",
    "audio/",
    "video/",
    "font/woff",
    "application/zip",
    "application/gzip",
    "application/pdf",
    "application/wasm",
    "application/octet-stream",
];

pub fn is_compressible(content_type: &str) -> bool {
    !INCOMPRESSIBLE_PREFIXES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}

/// True when `Accept-Encoding` lists gzip (or `*`) with a non-zero weight.
pub fn accepts_gzip(accept_encoding: &str) -> bool {
    accept_encoding.split(',').any(|item| {
        let mut params = item.split(';');
        let coding = params.next().unwrap_or("").trim();
        if !coding.eq_ignore_ascii_case("gzip") && coding != "*" {
            return false;
        }
        params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .all(|q| q.trim().parse::<f32>().map(|q| q > 0.0).unwrap_or(false))
    })
}

pub fn negotiate(accept_encoding: Option<&str>, enabled: bool, content_type: &str) -> Encoding {
    match accept_encoding {
        Some(ae) if enabled && accepts_gzip(ae) && is_compressible(content_type) => Encoding::Gzip,
        _ => Encoding::Identity,
    }
}

pub fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
