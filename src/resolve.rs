//! Maps request paths onto the served directory tree.

use crate::config::FsConfig;
use crate::error::ServeError;
use std::io;
use std::path::{Path, PathBuf};

/// Host segment used when the request carries no usable `Host` header.
pub const INVALID_HOST: &str = "invalid-host";

/// Where a request path landed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A regular file to serve, possibly an index file inside a directory.
    File(PathBuf),
    /// A directory without any index file; handed to the listing generator.
    Directory(PathBuf),
}

/// Splits a decoded request path into its segments, dropping empty and `.`
/// components. A `..` component or one carrying a NUL or backslash is
/// refused instead of being normalized away.
pub fn sanitize_path(path: &str) -> Result<Vec<&str>, ServeError> {
    let mut segments = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(ServeError::InvalidPath),
            p if p.contains(['\0', '\\']) => return Err(ServeError::InvalidPath),
            p => segments.push(p),
        }
    }
    Ok(segments)
}

/// Reduces a `Host` header to a single safe directory name.
pub fn sanitize_host(host: Option<&str>) -> String {
    let host = host.unwrap_or("").trim();

    // Strip the port, leaving bracketed IPv6 literals intact.
    let name = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or("")
    } else {
        host.split(':').next().unwrap_or("")
    };

    let name = name.to_ascii_lowercase();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        INVALID_HOST.to_string()
    } else {
        name
    }
}

/// Joins the request onto the root without touching the filesystem.
pub fn target_path(config: &FsConfig, path: &str, host: Option<&str>) -> Result<PathBuf, ServeError> {
    let segments = sanitize_path(path)?;

    let mut target = config.root.clone();
    if config.vhost {
        target.push(sanitize_host(host));
    }
    target.extend(segments);
    Ok(target)
}

/// Resolves a request to a file or an index-less directory.
pub async fn resolve(config: &FsConfig, path: &str, host: Option<&str>) -> Result<Resolved, ServeError> {
    let target = target_path(config, path, host)?;

    let metadata = match tokio::fs::metadata(&target).await {
        Ok(m) => m,
        Err(e) if is_missing(&e) => return Err(ServeError::NotFound),
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_dir() {
        return Ok(Resolved::File(target));
    }

    match find_index(&target, &config.index_names).await {
        Some(index) => Ok(Resolved::File(index)),
        None => Ok(Resolved::Directory(target)),
    }
}

async fn find_index(dir: &Path, index_names: &[String]) -> Option<PathBuf> {
    for name in index_names {
        let candidate = dir.join(name);
        if let Ok(m) = tokio::fs::metadata(&candidate).await {
            if m.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

// A regular file used as a directory component reports NotADirectory.
fn is_missing(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory)
}
