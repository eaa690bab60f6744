//! Counters for the static file pipeline, served at `/stats`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide static file counters. Shared across connection tasks
/// through an `Arc`; every update is a single atomic add.
#[derive(Debug, Default)]
pub struct Stats {
    calls: AtomicU64,
    ok: AtomicU64,
    not_modified: AtomicU64,
    not_found: AtomicU64,
    other: AtomicU64,
    body_bytes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub calls: u64,
    pub ok: u64,
    pub not_modified: u64,
    pub not_found: u64,
    pub other: u64,
    pub body_bytes: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one static file response.
    pub fn record(&self, status: u16, content_length: u64) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match status {
            200 => {
                self.ok.fetch_add(1, Ordering::Relaxed);
                self.body_bytes.fetch_add(content_length, Ordering::Relaxed);
            }
            304 => {
                self.not_modified.fetch_add(1, Ordering::Relaxed);
            }
            404 => {
                self.not_found.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.other.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            calls: self.calls.load(Ordering::Relaxed),
            ok: self.ok.load(Ordering::Relaxed),
            not_modified: self.not_modified.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
            body_bytes: self.body_bytes.load(Ordering::Relaxed),
        }
    }

    /// Named counter values in a fixed order.
    pub fn counters(&self) -> [(&'static str, u64); 6] {
        let s = self.snapshot();
        [
            ("fsCalls", s.calls),
            ("fsOKResponses", s.ok),
            ("fsNotModifiedResponses", s.not_modified),
            ("fsNotFoundResponses", s.not_found),
            ("fsOtherResponses", s.other),
            ("fsResponseBodyBytes", s.body_bytes),
        ]
    }
}

/// Plain-text dump of `name: value` lines whose name contains `filter`.
pub fn render<'a>(counters: impl IntoIterator<Item = (&'a str, u64)>, filter: Option<&str>) -> String {
    let mut out = String::new();
    for (name, value) in counters {
        if filter.map_or(true, |f| name.contains(f)) {
            let _ = writeln!(out, "{}: {}", name, value);
        }
    }
    out
}
