//! Listeners and the per-connection request loop.

use crate::config::Args;
use crate::error::StartupError;
use crate::handler::App;
use crate::http::{read_request, write_response};
use crate::tls;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tokio_rustls::TlsAcceptor;

const KEEPALIVE_TIMEOUT_SECS: u64 = 5;
const TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
const LINGER_MILLIS: u64 = 500;

pub struct Server {
    app: Arc<App>,
    http: Option<TcpListener>,
    https: Option<(TcpListener, TlsAcceptor)>,
}

impl Server {
    /// Binds every listener named in `args`. An empty address disables
    /// that listener.
    pub async fn bind(args: &Args) -> Result<Self, StartupError> {
        let config = args.fs_config();
        if !config.root.is_dir() {
            log::warn!("serve root {:?} is not a directory, every file will 404", config.root);
        }
        let app = Arc::new(App::new(config));

        let http = if args.addr.is_empty() {
            None
        } else {
            Some(bind_listener(&args.addr).await?)
        };

        let https = if args.tls_enabled() {
            let acceptor = tls::load_acceptor(&args.cert_file, &args.key_file)?;
            Some((bind_listener(&args.addr_tls).await?, acceptor))
        } else {
            None
        };

        Ok(Self { app, http, https })
    }

    /// Plain HTTP only, around an existing application.
    pub async fn bind_http(app: Arc<App>, addr: &str) -> Result<Self, StartupError> {
        Ok(Self {
            app,
            http: Some(bind_listener(addr).await?),
            https: None,
        })
    }

    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn tls_local_addr(&self) -> Option<SocketAddr> {
        self.https.as_ref().and_then(|(l, _)| l.local_addr().ok())
    }

    /// Serves until Ctrl+C or SIGTERM.
    pub async fn run(self) {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut listeners = JoinSet::new();
        if let Some(listener) = self.http {
            listeners.spawn(accept_loop(listener, Arc::clone(&self.app), None));
        }
        if let Some((listener, acceptor)) = self.https {
            listeners.spawn(accept_loop(listener, Arc::clone(&self.app), Some(acceptor)));
        }

        shutdown.await;
        log::info!("Shutdown signal received, stopping server...");
        listeners.shutdown().await;
        log::info!("Server shutdown complete");
    }
}

async fn bind_listener(addr: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })
}

async fn accept_loop(listener: TcpListener, app: Arc<App>, tls: Option<TlsAcceptor>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("accept failed: {}", e);
                continue;
            }
        };
        let _ = stream.set_nodelay(true);
        let app = Arc::clone(&app);

        match tls.clone() {
            None => {
                tokio::spawn(handle_connection(stream, app, peer));
            }
            Some(acceptor) => {
                tokio::spawn(async move {
                    let handshake = timeout(
                        Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
                        acceptor.accept(stream),
                    );
                    match handshake.await {
                        Ok(Ok(stream)) => handle_connection(stream, app, peer).await,
                        Ok(Err(e)) => log::debug!("{}: TLS handshake failed: {}", peer, e),
                        Err(_) => log::debug!("{}: TLS handshake timed out", peer),
                    }
                });
            }
        }
    }
}

/// Serves requests on one connection until the peer closes it, asks for
/// `Connection: close`, or stays idle past the keep-alive timeout.
pub async fn handle_connection<S>(stream: S, app: Arc<App>, peer: SocketAddr)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    loop {
        let request = match timeout(
            Duration::from_secs(KEEPALIVE_TIMEOUT_SECS),
            read_request(&mut stream),
        )
        .await
        {
            Ok(Ok(Some(Ok(request)))) => request,
            Ok(Ok(Some(Err(e)))) => {
                log::debug!("{}: rejected request: {:?}", peer, e);
                if write_response(&mut stream, e.response(), false).await.is_ok() {
                    linger_close(&mut stream).await;
                }
                break;
            }
            Ok(Ok(None)) | Ok(Err(_)) | Err(_) => break,
        };

        let keep_alive = request.keep_alive;
        let response = app.handle(&request).await;
        log::debug!(
            "{} {:?} {} -> {}",
            peer,
            request.method,
            request.path,
            response.status
        );

        if let Err(e) = write_response(&mut stream, response, keep_alive).await {
            if e.kind() != io::ErrorKind::BrokenPipe {
                log::debug!("{}: write failed: {}", peer, e);
            }
            break;
        }
        if !keep_alive {
            break;
        }
    }
    // Sends FIN, and close_notify on TLS streams.
    let _ = stream.shutdown().await;
}

// Sends FIN and drains what the peer already sent, so unread request bytes
// don't turn the close into a reset that eats the error response.
async fn linger_close<S>(stream: &mut BufReader<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if stream.shutdown().await.is_err() {
        return;
    }
    let mut buf = [0u8; 1024];
    let _ = timeout(Duration::from_millis(LINGER_MILLIS), async {
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    })
    .await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
