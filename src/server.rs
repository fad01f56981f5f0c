//! Serving an [`Engine`] over TCP.
//!
//! hyper owns the connections (HTTP/1.1 and HTTP/2 on the same port) and
//! reads each request body to the end. The chain then runs on tokio's
//! blocking pool, one thread per in-flight request, since handlers are
//! synchronous and may block.
//!
//! Shutdown is graceful: once the signal fires the listener is dropped,
//! connections already accepted are allowed to finish, and `serve` returns.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::Error;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;

enum Listen {
    On(SocketAddr),
    Bound(TcpListener),
}

/// Accepts connections and feeds their requests to an [`Engine`].
pub struct Server {
    listen: Listen,
}

impl Server {
    /// A server that will listen on `addr` once [`serve`](Server::serve)
    /// is awaited.
    ///
    /// # Panics
    ///
    /// If `addr` does not parse as `host:port`. Use
    /// [`from_config`](Server::from_config) to get an error instead.
    ///
    /// ```rust,no_run
    /// let server = gantry::Server::bind("127.0.0.1:8080");
    /// ```
    pub fn bind(addr: &str) -> Self {
        match addr.parse() {
            Ok(addr) => Self { listen: Listen::On(addr) },
            Err(e) => panic!("`{addr}` is not a socket address: {e}"),
        }
    }

    /// A server listening on `config.addr`.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Ok(Self { listen: Listen::On(config.socket_addr()?) })
    }

    /// A server on a listener the caller already bound (port 0 in tests,
    /// an inherited socket, ...).
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listen: Listen::Bound(listener) }
    }

    /// Serves until SIGTERM or Ctrl-C, then drains open connections.
    pub async fn serve(self, engine: Engine) -> Result<(), Error> {
        self.serve_with_shutdown(engine, shutdown_signal()).await
    }

    /// Serves until `signal` resolves, then drains open connections.
    pub async fn serve_with_shutdown(
        self,
        engine: Engine,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = self.listen.into_listener().await?;
        let engine = Arc::new(engine);
        let mut connections = JoinSet::new();

        info!(addr = %listener.local_addr()?, "listening");
        tokio::pin!(signal);

        loop {
            tokio::select! {
                // A pending signal wins over queued connections.
                biased;

                () = &mut signal => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(Arc::clone(&engine), stream, peer));
                    }
                    Err(e) => error!("accept failed: {e}"),
                },

                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        info!(open = connections.len(), "shutting down, waiting for open connections");
        while connections.join_next().await.is_some() {}
        info!("stopped");
        Ok(())
    }
}

impl Listen {
    async fn into_listener(self) -> Result<TcpListener, Error> {
        Ok(match self {
            Self::On(addr) => TcpListener::bind(addr).await?,
            Self::Bound(listener) => listener,
        })
    }
}

async fn serve_connection(engine: Arc<Engine>, stream: TcpStream, peer: SocketAddr) {
    let service = service_fn(move |req| handle(Arc::clone(&engine), req, peer));

    let served = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await;
    if let Err(e) = served {
        warn!(%peer, "connection closed with error: {e}");
    }
}

/// One request, start to finish. Never fails towards hyper: an unsupported
/// method is `405`, an unreadable body `400`, and a blocking task that dies
/// outside the engine's own panic guard `500`.
async fn handle(
    engine: Arc<Engine>,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        return Ok(Response::status(StatusCode::METHOD_NOT_ALLOWED).into_inner());
    };

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(%peer, "reading request body failed: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let request = Request::from_parts(method, &parts, body, peer);
    let response = tokio::task::spawn_blocking(move || engine.dispatch(request))
        .await
        .unwrap_or_else(|e| {
            error!(%peer, "dispatch task failed: {e}");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        });

    Ok(response.into_inner())
}

/// Ctrl-C anywhere, and SIGTERM on Unix (what orchestrators send).
///
/// # Panics
///
/// If the signal handlers cannot be installed.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => panic!("cannot install SIGTERM handler: {e}"),
        };
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    panic!("cannot install Ctrl-C handler: {e}");
                }
            }
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    if let Err(e) = tokio::signal::ctrl_c().await {
        panic!("cannot install Ctrl-C handler: {e}");
    }
}
