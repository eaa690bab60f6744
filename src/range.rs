//! `Range: bytes=...` handling. Only the first range of a multi-range
//! request is honored.

/// Portion of a representation selected by the `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    Whole,
    /// Inclusive byte interval within `[0, size)`.
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

impl RangeSpec {
    /// `Content-Range` header value for a 206 or 416 response.
    pub fn content_range(&self, size: u64) -> Option<String> {
        match *self {
            RangeSpec::Whole => None,
            RangeSpec::Partial { start, end } => Some(format!("bytes {}-{}/{}", start, end, size)),
            RangeSpec::Unsatisfiable => Some(format!("bytes */{}", size)),
        }
    }
}

pub fn negotiate(header: Option<&str>, size: u64, enabled: bool) -> RangeSpec {
    match header {
        Some(value) if enabled => parse_range(value, size),
        _ => RangeSpec::Whole,
    }
}

/// Parses a `Range` header against a representation of `size` bytes.
/// Malformed input falls back to the whole representation.
pub fn parse_range(header: &str, size: u64) -> RangeSpec {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeSpec::Whole;
    };
    let first = spec.split(',').next().unwrap_or("").trim();
    let Some((start, end)) = first.split_once('-') else {
        return RangeSpec::Whole;
    };
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        // Suffix form: the last `n` bytes.
        let Ok(n) = end.parse::<u64>() else {
            return RangeSpec::Whole;
        };
        if n == 0 || size == 0 {
            return RangeSpec::Unsatisfiable;
        }
        return RangeSpec::Partial {
            start: size.saturating_sub(n),
            end: size - 1,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return RangeSpec::Whole;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<u64>() {
            Ok(e) => Some(e),
            Err(_) => return RangeSpec::Whole,
        }
    };

    if start >= size {
        return RangeSpec::Unsatisfiable;
    }
    match end {
        Some(e) if start > e => RangeSpec::Unsatisfiable,
        Some(e) => RangeSpec::Partial {
            start,
            end: e.min(size - 1),
        },
        None => RangeSpec::Partial { start, end: size - 1 },
    }
}
