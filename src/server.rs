//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. Stops calling `listener.accept()` at once, so no new connection gets in.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, Instrument};

use crate::error::{ApiError, Error};
use crate::method::Method;
use crate::middleware::trace::{request_span, AccessLog};
use crate::request::Request;
use crate::response::{IntoResponse, Response};
use crate::router::{Lookup, Router};

/// Request bodies larger than this are refused unless configured otherwise.
const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
    max_body_bytes: usize,
}

impl Server {
    /// Binds a listener on `addr` (`host:port`; port `0` picks a free one).
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # async fn run() -> Result<(), bookshelf::Error> {
    /// let server = bookshelf::Server::bind("127.0.0.1:9090").await?;
    /// # Ok(()) }
    /// ```
    pub async fn bind(addr: &str) -> Result<Self, Error> {
        let addr: SocketAddr = addr.parse().map_err(|source| Error::InvalidAddress {
            addr: addr.to_owned(),
            source,
        })?;
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, max_body_bytes: DEFAULT_MAX_BODY_BYTES })
    }

    /// Largest request body collected before the handler runs. Bigger bodies
    /// are answered with `400` and never reach the handler.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve<S>(self, router: Router<S>) -> Result<(), Error>
    where
        S: Send + Sync + 'static,
    {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting when `signal` resolves.
    pub async fn serve_with_shutdown<S, F>(self, router: Router<S>, signal: F) -> Result<(), Error>
    where
        S: Send + Sync + 'static,
        F: Future<Output = ()>,
    {
        let Self { listener, max_body_bytes } = self;
        let router = Arc::new(router);

        info!(addr = %listener.local_addr()?, "bookshelf listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal immediately stops accepting
                // new connections, even if more are queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req, remote_addr, max_body_bytes).await }
                        });

                        // `auto::Builder` serves HTTP/1.1 and HTTP/2 alike.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("bookshelf stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response.
///
/// Every failure becomes a response here, so hyper never sees an error.
async fn dispatch<S>(
    router: Arc<Router<S>>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    max_body_bytes: usize,
) -> Result<http::Response<Full<Bytes>>, Infallible>
where
    S: Send + Sync + 'static,
{
    let span = request_span(req.method().as_str(), req.uri().path());
    let response = async move {
        let access = AccessLog::start(remote_addr);
        let response = route(&router, req, max_body_bytes).await;
        access.finish(response.status_code());
        response
    }
    .instrument(span)
    .await;

    Ok(response.into_inner())
}

async fn route<S>(router: &Router<S>, req: hyper::Request<Incoming>, max_body_bytes: usize) -> Response
where
    S: Send + Sync + 'static,
{
    let method = req.method().as_str().parse::<Method>().ok();
    let path = req.uri().path().to_owned();

    let (method, handler, params) = match router.lookup(method, &path) {
        Lookup::Found(method, handler, params) => (method, handler, params),
        Lookup::MethodNotAllowed(allowed) => {
            return ApiError::MethodNotAllowed { allowed }.into_response();
        }
        Lookup::NotFound => return ApiError::NotFound.into_response(),
    };
    let (parts, body) = req.into_parts();
    let body = match collect_body(body, max_body_bytes).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let request = Request::new(method, path, parts.headers, body, params);
    handler.call(router.state(), request).await
}

async fn collect_body(body: Incoming, limit: usize) -> Result<Bytes, ApiError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<http_body_util::LengthLimitError>() => Err(ApiError::BodyTooLarge { limit }),
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            Err(ApiError::InvalidRequest)
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A handler that cannot be installed
/// is logged and that signal is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves, so on non-Unix platforms the SIGTERM arm
    // is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
