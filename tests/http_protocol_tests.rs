use fileserver::server::Server;
use fileserver::{App, FsConfig};
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use fileserver::http::{read_request, RequestError, MAX_REQUEST_LINE};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    app: Arc<App>,
    _shutdown: oneshot::Sender<()>,
    _root: TempDir,
}

async fn start_server(tweak: impl FnOnce(&mut FsConfig)) -> TestServer {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("index.html"), "<html><body>Home Page</body></html>").unwrap();
    fs::write(root.path().join("digits.txt"), "0123456789").unwrap();

    let mut config = FsConfig::with_root(root.path());
    config.stream_interval = Duration::ZERO;
    tweak(&mut config);

    let app = Arc::new(App::new(config));
    let server = Server::bind_http(Arc::clone(&app), "127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        app,
        _shutdown: tx,
        _root: root,
    }
}

async fn send_raw(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

async fn send_get_request(addr: SocketAddr, path: &str) -> String {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
    send_raw(addr, &request).await
}

#[cfg(test)]
mod request_line_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_returns_file() {
        let server = start_server(|_| {}).await;
        let response = send_get_request(server.addr, "/index.html").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
        assert!(response.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(response.contains("Content-Length: 35\r\n"));
        assert!(response.contains("Server: fileserver\r\n"));
        assert!(response.contains("Date: "));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.ends_with("Home Page</body></html>"));
    }

    #[tokio::test]
    async fn test_head_sends_headers_only() {
        let server = start_server(|_| {}).await;
        let response = send_raw(
            server.addr,
            "HEAD /index.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 35\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_post_is_405() {
        let server = start_server(|_| {}).await;
        let response = send_raw(server.addr, "POST /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.ends_with("Method not allowed"));
        assert_eq!(server.app.stats().snapshot().calls, 0);
    }

    #[tokio::test]
    async fn test_malformed_request_line_is_400() {
        let server = start_server(|_| {}).await;
        let response = send_raw(server.addr, "GARBAGE\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        let response = send_raw(server.addr, "GET index.html HTTP/1.1 extra\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_oversized_request_line_is_413() {
        let server = start_server(|_| {}).await;
        let request = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(9000));
        let response = send_raw(server.addr, &request).await;
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }

    #[tokio::test]
    async fn test_http10_closes_by_default() {
        let server = start_server(|_| {}).await;
        let response = send_raw(server.addr, "GET /digits.txt HTTP/1.0\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.ends_with("0123456789"));
    }
}

#[cfg(test)]
mod request_reader_tests {
    use super::*;

    async fn read_with_deadline<R>(reader: &mut R) -> Result<fileserver::Request, RequestError>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        tokio::time::timeout(Duration::from_secs(5), read_request(reader))
            .await
            .expect("reader must give up at the line limit")
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_endless_request_line_stops_at_limit() {
        let mut reader = BufReader::new(tokio::io::repeat(b'a'));
        assert_eq!(read_with_deadline(&mut reader).await.unwrap_err(), RequestError::TooLarge);
    }

    #[tokio::test]
    async fn test_endless_header_line_stops_at_limit() {
        let head: &[u8] = b"GET / HTTP/1.1\r\nX-Filler: ";
        let mut reader = BufReader::new(head.chain(tokio::io::repeat(b'b')));
        assert_eq!(read_with_deadline(&mut reader).await.unwrap_err(), RequestError::TooLarge);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_accepted() {
        let target = format!("/{}", "a".repeat(MAX_REQUEST_LINE - "GET / HTTP/1.1\r\n".len()));
        let raw = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", target);
        let mut reader = BufReader::new(raw.as_bytes());
        let request = read_with_deadline(&mut reader).await.unwrap();
        assert_eq!(request.path, target);
        assert_eq!(request.header("host"), Some("localhost"));
    }

    #[tokio::test]
    async fn test_undecodable_target_is_400() {
        let server = start_server(|_| {}).await;
        let response = send_raw(server.addr, "GET /%FF HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "got: {}", response);
    }
}

#[cfg(test)]
mod keep_alive_tests {
    use super::*;

    #[tokio::test]
    async fn test_pipelined_requests_on_one_connection() {
        let server = start_server(|_| {}).await;
        let request = "GET /digits.txt HTTP/1.1\r\nHost: localhost\r\n\r\n\
                       GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let response = send_raw(server.addr, request).await;

        let first = response.find("HTTP/1.1 200 OK").unwrap();
        let second = response.find("HTTP/1.1 404 Not Found").unwrap();
        assert!(first < second);
        assert!(response.contains("Connection: keep-alive\r\n"));

        let snapshot = server.app.stats().snapshot();
        assert_eq!(snapshot.calls, 2);
        assert_eq!(snapshot.ok, 1);
        assert_eq!(snapshot.not_found, 1);
    }
}

#[cfg(test)]
mod wire_feature_tests {
    use super::*;

    #[tokio::test]
    async fn test_range_over_the_wire() {
        let server = start_server(|c| c.byte_range = true).await;
        let response = send_raw(
            server.addr,
            "GET /digits.txt HTTP/1.1\r\nRange: bytes=10-20\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 416 Range Not Satisfiable\r\n"));
        assert!(response.contains("Content-Range: bytes */10\r\n"));
        assert!(response.contains("Content-Length: 0\r\n"));
        assert!(response.ends_with("\r\n\r\n"));

        let response = send_raw(
            server.addr,
            "GET /digits.txt HTTP/1.1\r\nRange: bytes=3-5\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 206 Partial Content\r\n"));
        assert!(response.ends_with("\r\n\r\n345"));
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let server = start_server(|_| {}).await;
        send_get_request(server.addr, "/index.html").await;
        let response = send_get_request(server.addr, "/stats?r=fsOK").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(response.ends_with("\r\n\r\nfsOKResponses: 1\n"));
    }

    #[tokio::test]
    async fn test_stream_uses_chunked_encoding() {
        let server = start_server(|_| {}).await;
        let response = send_get_request(server.addr, "/stream").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Transfer-Encoding: chunked\r\n"));
        assert!(!response.contains("Content-Length"));
        assert_eq!(response.matches("\"Altitude\"").count(), 8);
        assert!(response.ends_with("\r\n0\r\n\r\n"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connections_are_all_counted() {
        const K: usize = 32;
        let server = start_server(|_| {}).await;

        let mut handles = Vec::new();
        for _ in 0..K {
            let addr = server.addr;
            handles.push(tokio::spawn(async move { send_get_request(addr, "/index.html").await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().starts_with("HTTP/1.1 200 OK\r\n"));
        }

        let snapshot = server.app.stats().snapshot();
        assert_eq!(snapshot.calls, K as u64);
        assert_eq!(snapshot.ok, K as u64);
        assert_eq!(snapshot.body_bytes, 35 * K as u64);
    }
}
