//! Request dispatch and the static file pipeline.

use crate::cache::ResponseCache;
use crate::compress::{self, Encoding};
use crate::config::FsConfig;
use crate::error::ServeError;
use crate::http::{Body, Request, Response};
use crate::range::{self, RangeSpec};
use crate::resolve::{self, Resolved};
use crate::stats::{self, Stats};
use crate::{demo, get_mime_type, index};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Stats,
    Hello,
    Json,
    Stream,
}

/// Reserved paths, matched exactly and in order. Everything else is a file.
pub const ROUTES: &[(&str, Route)] = &[
    ("/stats", Route::Stats),
    ("/hello", Route::Hello),
    ("/json", Route::Json),
    ("/stream", Route::Stream),
];

pub fn route(path: &str) -> Option<Route> {
    ROUTES.iter().find(|(p, _)| *p == path).map(|(_, r)| *r)
}

/// Shared per-process state handed to every connection.
pub struct App {
    config: FsConfig,
    cache: ResponseCache,
    stats: Arc<Stats>,
}

impl App {
    pub fn new(config: FsConfig) -> Self {
        Self::with_stats(config, Arc::new(Stats::new()))
    }

    pub fn with_stats(config: FsConfig, stats: Arc<Stats>) -> Self {
        Self {
            config,
            cache: ResponseCache::new(),
            stats,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn handle(&self, request: &Request) -> Response {
        let mut response = match route(&request.path) {
            Some(Route::Stats) => self.stats_page(request),
            Some(Route::Hello) => demo::hello(),
            Some(Route::Json) => demo::json(),
            Some(Route::Stream) => demo::stream(self.config.stream_interval),
            None => {
                let response = self.serve_static(request).await;
                self.stats.record(response.status, response.content_length());
                response
            }
        };

        if request.is_head() {
            response.strip_body();
        }
        response
    }

    fn stats_page(&self, request: &Request) -> Response {
        let filter = request.query_param("r");
        let cache_entries = ("fsCacheEntries", self.cache.len() as u64);
        let body = stats::render(
            self.stats.counters().into_iter().chain([cache_entries]),
            filter.as_deref(),
        );
        Response::new(200)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(Body::Bytes(body.into_bytes()))
    }

    pub async fn serve_static(&self, request: &Request) -> Response {
        match self.try_serve_static(request).await {
            Ok(response) => response,
            Err(e) => {
                if e.status() >= 500 {
                    log::warn!("GET {}: {}", request.path, e);
                } else {
                    log::debug!("GET {}: {}", request.path, e);
                }
                Response::text(e.status(), e.message())
            }
        }
    }

    async fn try_serve_static(&self, request: &Request) -> Result<Response, ServeError> {
        let file = match resolve::resolve(&self.config, &request.path, request.header("host")).await? {
            Resolved::File(file) => file,
            Resolved::Directory(dir) => {
                let html = index::generate(&dir, &request.path, self.config.generate_index_pages).await?;
                return Ok(Response::new(200)
                    .with_header("Content-Type", "text/html; charset=utf-8")
                    .with_body(Body::Bytes(html.into_bytes())));
            }
        };

        let metadata = tokio::fs::metadata(&file).await?;
        let size = metadata.len();
        if size > self.config.max_file_size {
            return Err(ServeError::FileTooLarge {
                size,
                limit: self.config.max_file_size,
            });
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let etag = weak_etag(size, modified);
        let last_modified = httpdate::fmt_http_date(modified);

        if is_not_modified(
            request.header("if-none-match"),
            request.header("if-modified-since"),
            modified,
            &etag,
        ) {
            return Ok(Response::new(304)
                .with_header("Last-Modified", last_modified)
                .with_header("ETag", etag));
        }

        let content_type = get_mime_type(&file);
        let range = range::negotiate(request.header("range"), size, self.config.byte_range);
        if range == RangeSpec::Unsatisfiable {
            let mut response = Response::new(416);
            if let Some(content_range) = range.content_range(size) {
                response = response.with_header("Content-Range", content_range);
            }
            return Ok(response);
        }

        // Ranges always address the raw file bytes.
        let encoding = match range {
            RangeSpec::Whole => compress::negotiate(
                request.header("accept-encoding"),
                self.config.compress,
                content_type,
            ),
            _ => Encoding::Identity,
        };

        let payload = self.cache.get(&file, encoding, modified).await?;
        let total = payload.len();

        let mut response = Response::new(200)
            .with_header("Content-Type", content_type)
            .with_header("Last-Modified", last_modified)
            .with_header("ETag", etag)
            .with_header("X-Content-Type-Options", "nosniff");
        if self.config.byte_range {
            response = response.with_header("Accept-Ranges", "bytes");
        }
        if self.config.compress && compress::is_compressible(content_type) {
            response = response.with_header("Vary", "Accept-Encoding");
        }
        if let Some(value) = encoding.header_value() {
            response = response.with_header("Content-Encoding", value);
        }

        let (start, end) = match range {
            RangeSpec::Partial { start, end } if total > 0 => {
                // The file may have shrunk since its metadata was read.
                let end = (end as usize).min(total - 1);
                let start = (start as usize).min(end);
                response.status = 206;
                response = response.with_header("Content-Range", format!("bytes {}-{}/{}", start, end, total));
                (start, end + 1)
            }
            _ => (0, total),
        };

        Ok(response.with_body(Body::Shared {
            data: payload,
            start,
            end,
        }))
    }
}

/// `W/"<size>-<mtime seconds>"`
pub fn weak_etag(size: u64, modified: SystemTime) -> String {
    format!("W/\"{}-{}\"", size, unix_secs(modified))
}

fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Evaluates the conditional request headers against the current file.
pub fn is_not_modified(
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    modified: SystemTime,
    etag: &str,
) -> bool {
    // If-None-Match takes precedence over If-Modified-Since
    if let Some(none_match) = if_none_match {
        if none_match.trim() == "*" {
            return true;
        }
        let ours = etag.trim_start_matches("W/").trim_matches('"');
        return none_match
            .split(',')
            .map(|tag| tag.trim().trim_start_matches("W/").trim_matches('"'))
            .any(|theirs| theirs == ours);
    }

    if let Some(since) = if_modified_since {
        if let Ok(since) = httpdate::parse_http_date(since.trim()) {
            // HTTP dates carry whole seconds only.
            return unix_secs(modified) <= unix_secs(since);
        }
    }

    false
}
