//! Directory listings for directories without an index file.

use crate::error::ServeError;
use std::fmt::Write;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
}

/// Reads and renders the listing for `dir`, requested as `url_path`.
pub async fn generate(dir: &Path, url_path: &str, enabled: bool) -> Result<String, ServeError> {
    if !enabled {
        return Err(ServeError::IndexDisabled);
    }
    let entries = read_entries(dir).await?;
    Ok(render(url_path, entries))
}

pub async fn read_entries(dir: &Path) -> Result<Vec<DirEntry>, ServeError> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        // Entries that vanish or can't be stat'ed are left out of the listing.
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: metadata.is_dir(),
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    Ok(entries)
}

/// Renders a listing: directories first, then files, each group by name.
pub fn render(url_path: &str, mut entries: Vec<DirEntry>) -> String {
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let base = if url_path.ends_with('/') {
        url_path.to_string()
    } else {
        format!("{}/", url_path)
    };
    let title = escape_html(&base);
    let base_href = encode_path(&base);

    let mut html = String::with_capacity(256 + entries.len() * 128);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n\
         <body><h1>Index of {title}</h1>\n<ul>\n"
    );

    if base != "/" {
        let parent = parent_of(&base_href);
        let _ = writeln!(html, "<li><a href=\"{}\" class=\"parent\">..</a></li>", escape_html(parent));
    }

    for entry in &entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        let href = format!("{}{}{}", base_href, urlencoding::encode(&entry.name), suffix);
        let label = escape_html(&entry.name);
        if entry.is_dir {
            let _ = writeln!(
                html,
                "<li><a href=\"{}\" class=\"dir\">{}/</a></li>",
                escape_html(&href),
                label
            );
        } else {
            let _ = writeln!(
                html,
                "<li><a href=\"{}\">{}</a>, {} bytes, {}</li>",
                escape_html(&href),
                label,
                entry.size,
                httpdate::fmt_http_date(entry.modified)
            );
        }
    }

    html.push_str("</ul></body></html>\n");
    html
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// "/a/b/" -> "/a/"
fn parent_of(base: &str) -> &str {
    let trimmed = base.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &base[..=pos],
        None => "/",
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
