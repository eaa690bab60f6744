//! Minimal HTTP/1.1 request parsing and response serialization.

use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

pub const MAX_REQUEST_LINE: usize = 8192;
pub const MAX_HEADERS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

/// A parsed request. Header names are stored lowercased.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Percent-decoded path, without the query string.
    pub path: String,
    pub query: Option<String>,
    pub keep_alive: bool,
    headers: Vec<(String, String)>,
}

impl Request {
    /// Splits off the query and percent-decodes the path. A path that does
    /// not decode to UTF-8 is malformed.
    pub fn new(method: Method, target: &str) -> Result<Self, RequestError> {
        let (raw_path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target, None),
        };
        let path = urlencoding::decode(raw_path)
            .map_err(|_| RequestError::Malformed)?
            .into_owned();

        Ok(Self {
            method,
            path,
            query,
            keep_alive: true,
            headers: Vec::new(),
        })
    }

    pub fn get(target: &str) -> Result<Self, RequestError> {
        Self::new(Method::Get, target)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_head(&self) -> bool {
        self.method == Method::Head
    }

    /// First value of query parameter `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            if k != name {
                return None;
            }
            let v = v.replace('+', " ");
            Some(urlencoding::decode(&v).map(|s| s.into_owned()).unwrap_or(v))
        })
    }
}

/// Why a request could not be read off the wire.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestError {
    Malformed,
    TooLarge,
    MethodNotAllowed,
}

impl RequestError {
    pub fn response(&self) -> Response {
        match self {
            RequestError::Malformed => Response::text(400, "Malformed request"),
            RequestError::TooLarge => Response::text(413, "Request too large"),
            RequestError::MethodNotAllowed => Response::text(405, "Method not allowed"),
        }
    }
}

// `METHOD /target HTTP/x.y`, nothing more.
fn parse_request_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.split(' ').filter(|part| !part.is_empty());

    let method = parts.next()?;
    let target = parts.next()?;
    let version = parts.next()?;

    if parts.next().is_some() || !version.starts_with("HTTP/") || !target.starts_with('/') {
        return None;
    }
    Some((method, target, version))
}

/// Reads one request. `Ok(None)` means the peer closed the connection
/// before sending anything.
pub async fn read_request<R>(reader: &mut R) -> std::io::Result<Option<Result<Request, RequestError>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if read_bounded_line(reader, &mut line).await? == 0 {
            return Ok(None);
        }
        if line.len() > MAX_REQUEST_LINE {
            return Ok(Some(Err(RequestError::TooLarge)));
        }
        // Tolerate blank lines between keep-alive requests.
        if !line.trim().is_empty() {
            break;
        }
    }

    let Some((method, target, version)) = parse_request_line(line.trim()) else {
        return Ok(Some(Err(RequestError::Malformed)));
    };
    let method = match method {
        "GET" => Method::Get,
        "HEAD" => Method::Head,
        _ => return Ok(Some(Err(RequestError::MethodNotAllowed))),
    };

    let mut request = match Request::new(method, target) {
        Ok(request) => request,
        Err(e) => return Ok(Some(Err(e))),
    };
    let http11 = version == "HTTP/1.1";
    request.keep_alive = http11;

    let mut header = String::new();
    loop {
        header.clear();
        if read_bounded_line(reader, &mut header).await? == 0 {
            break;
        }
        if header.len() > MAX_REQUEST_LINE || request.headers.len() >= MAX_HEADERS {
            return Ok(Some(Err(RequestError::TooLarge)));
        }
        let line = header.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Ok(Some(Err(RequestError::Malformed)));
        };
        let (name, value) = (name.trim(), value.trim());
        if name.eq_ignore_ascii_case("connection") {
            let value = value.to_ascii_lowercase();
            request.keep_alive = !value.contains("close") && (http11 || value.contains("keep-alive"));
        }
        request.headers.push((name.to_ascii_lowercase(), value.to_string()));
    }

    Ok(Some(Ok(request)))
}

// Stops one byte past the limit, so an endless line can't grow the buffer.
async fn read_bounded_line<R>(reader: &mut R, buf: &mut String) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    (&mut *reader)
        .take(MAX_REQUEST_LINE as u64 + 1)
        .read_line(buf)
        .await
}

pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// A slice of a shared cached payload.
    Shared { data: Arc<Vec<u8>>, start: usize, end: usize },
    /// Chunks produced by another task; the body ends when the sender drops.
    Stream(mpsc::Receiver<Vec<u8>>),
}

impl Body {
    pub fn len(&self) -> Option<u64> {
        match self {
            Body::Empty => Some(0),
            Body::Bytes(b) => Some(b.len() as u64),
            Body::Shared { start, end, .. } => Some((end - start) as u64),
            Body::Stream(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(&[][..]),
            Body::Bytes(b) => Some(b.as_slice()),
            Body::Shared { data, start, end } => Some(&data[*start..*end]),
            Body::Stream(_) => None,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.len() {
            Some(n) => write!(f, "Body({} bytes)", n),
            None => f.write_str("Body(stream)"),
        }
    }
}

#[derive(Debug)]
pub struct Response {
    pub status: u16,
    headers: Vec<(String, String)>,
    pub body: Body,
    /// Length announced for a HEAD request whose body was not built.
    head_length: Option<u64>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
            head_length: None,
        }
    }

    pub fn text(status: u16, message: &str) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(Body::Bytes(message.as_bytes().to_vec()))
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Value of `Content-Length` as it will be sent. Streams report zero.
    pub fn content_length(&self) -> u64 {
        self.head_length.or(self.body.len()).unwrap_or(0)
    }

    /// Drops the body but keeps announcing its length, for HEAD.
    pub fn strip_body(&mut self) {
        if let Some(len) = self.body.len() {
            self.head_length = Some(len);
        }
        self.body = Body::Empty;
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_slice().unwrap_or(&[])
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Serializes `response`. Bodies of unknown length use chunked encoding.
pub async fn write_response<W>(writer: &mut W, mut response: Response, keep_alive: bool) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nDate: {}\r\nServer: fileserver\r\n",
        response.status,
        reason_phrase(response.status),
        httpdate::fmt_http_date(SystemTime::now())
    );
    for (name, value) in &response.headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }

    let chunked = matches!(response.body, Body::Stream(_));
    if chunked {
        head.push_str("Transfer-Encoding: chunked\r\n");
    } else if response.status != 304 {
        head.push_str(&format!("Content-Length: {}\r\n", response.content_length()));
    }
    head.push_str(if keep_alive {
        "Connection: keep-alive\r\n\r\n"
    } else {
        "Connection: close\r\n\r\n"
    });
    writer.write_all(head.as_bytes()).await?;

    match &mut response.body {
        Body::Stream(rx) => {
            while let Some(chunk) = rx.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                writer.write_all(format!("{:x}\r\n", chunk.len()).as_bytes()).await?;
                writer.write_all(&chunk).await?;
                writer.write_all(b"\r\n").await?;
                writer.flush().await?;
            }
            writer.write_all(b"0\r\n\r\n").await?;
        }
        body => {
            if let Some(bytes) = body.as_slice() {
                writer.write_all(bytes).await?;
            }
        }
    }
    writer.flush().await
}
