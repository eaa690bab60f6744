use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024; // 50MB

/// Command line options. Every flag can also be set from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "fileserver", version, about = "Serves static files from a directory")]
pub struct Args {
    /// TCP address to listen to
    #[arg(long, env = "FILESERVER_ADDR", default_value = "localhost:8080")]
    pub addr: String,

    /// TCP address to listen to TLS (aka SSL or HTTPS) requests. Empty disables TLS
    #[arg(long, env = "FILESERVER_ADDR_TLS", default_value = "")]
    pub addr_tls: String,

    /// Enables byte range requests
    #[arg(long, env = "FILESERVER_BYTE_RANGE")]
    pub byte_range: bool,

    /// Path to TLS certificate file
    #[arg(long, env = "FILESERVER_CERT_FILE", default_value = "./ssl-cert-snakeoil.pem")]
    pub cert_file: PathBuf,

    /// Path to TLS key file
    #[arg(long, env = "FILESERVER_KEY_FILE", default_value = "./ssl-cert-snakeoil.key")]
    pub key_file: PathBuf,

    /// Enables transparent gzip response compression
    #[arg(long, env = "FILESERVER_COMPRESS")]
    pub compress: bool,

    /// Directory to serve static files from
    #[arg(long, env = "FILESERVER_DIR", default_value = "/usr/share/nginx/html")]
    pub dir: PathBuf,

    /// Whether to generate directory index pages
    #[arg(
        long,
        env = "FILESERVER_GENERATE_INDEX_PAGES",
        action = ArgAction::Set,
        default_value_t = true
    )]
    pub generate_index_pages: bool,

    /// Prepends the requested path with the requested hostname
    #[arg(long, env = "FILESERVER_VHOST")]
    pub vhost: bool,

    /// Index file names probed in order for directory requests
    #[arg(
        long,
        env = "FILESERVER_INDEX_NAMES",
        value_delimiter = ',',
        default_value = "index.html"
    )]
    pub index_names: Vec<String>,

    /// Files larger than this many bytes are refused with 413
    #[arg(long, env = "FILESERVER_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Pause between items of the /stream demo, in milliseconds
    #[arg(long, env = "FILESERVER_STREAM_INTERVAL_MS", default_value_t = 1000)]
    pub stream_interval_ms: u64,
}

impl Args {
    pub fn tls_enabled(&self) -> bool {
        !self.addr_tls.is_empty()
    }

    pub fn fs_config(&self) -> FsConfig {
        FsConfig {
            root: self.dir.clone(),
            index_names: self.index_names.clone(),
            generate_index_pages: self.generate_index_pages,
            compress: self.compress,
            byte_range: self.byte_range,
            vhost: self.vhost,
            max_file_size: self.max_file_size,
            stream_interval: Duration::from_millis(self.stream_interval_ms),
        }
    }
}

/// Settings consumed by the request pipeline.
#[derive(Debug, Clone)]
pub struct FsConfig {
    pub root: PathBuf,
    pub index_names: Vec<String>,
    pub generate_index_pages: bool,
    pub compress: bool,
    pub byte_range: bool,
    pub vhost: bool,
    pub max_file_size: u64,
    pub stream_interval: Duration,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index_names: vec!["index.html".to_string()],
            generate_index_pages: true,
            compress: false,
            byte_range: false,
            vhost: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            stream_interval: Duration::from_secs(1),
        }
    }
}

impl FsConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}
