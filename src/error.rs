use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the static file pipeline. Each maps to a response status.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("path escapes the served root")]
    InvalidPath,

    #[error("file not found")]
    NotFound,

    #[error("directory listing is disabled")]
    IndexDisabled,

    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ServeError {
    pub fn status(&self) -> u16 {
        match self {
            ServeError::InvalidPath => 400,
            ServeError::NotFound => 404,
            ServeError::IndexDisabled => 403,
            ServeError::FileTooLarge { .. } => 413,
            ServeError::Io(e) if e.kind() == io::ErrorKind::NotFound => 404,
            ServeError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => 403,
            ServeError::Io(_) => 500,
        }
    }

    /// Short plain-text body sent with the error status.
    pub fn message(&self) -> &'static str {
        match self.status() {
            400 => "Invalid path",
            403 => "Forbidden",
            404 => "File not found",
            413 => "File too large",
            _ => "Internal server error",
        }
    }
}

/// Fatal errors raised while starting the listeners.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot read {}: {source}", path.display())]
    TlsFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no {what} found in {}", path.display())]
    TlsMissing { what: &'static str, path: PathBuf },

    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
}
