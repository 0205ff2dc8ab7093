//! HTTP server and graceful shutdown.
//!
//! The server is the outermost caller of the router: it reads method, path
//! and host off the wire, asks the [`SessionStore`] for the caller's
//! privilege, and turns the [`Outcome`] into bytes. Redirects become
//! `302 Found`; pages go to the renderer.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Immediately stops `listener.accept()`; no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.

use std::net::SocketAddr;
use std::sync::Arc;

use http::HeaderMap;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::render::{BoxedRender, Page, Render};
use crate::request::Request;
use crate::response::{ContentType, Response};
use crate::router::{Outcome, Router};

/// Source of the caller's privilege level.
///
/// Session management lives outside turnstile; implement this over
/// whatever holds your sessions (a cookie lookup, a signed token). `None`
/// means no session, which ranks as privilege 0.
///
/// Closures over the request headers implement it:
///
/// ```rust
/// use http::HeaderMap;
///
/// let sessions = |headers: &HeaderMap| {
///     headers.get("x-privilege")?.to_str().ok()?.parse::<u32>().ok()
/// };
/// # fn is_store(_: impl turnstile::SessionStore) {}
/// # is_store(sessions);
/// ```
pub trait SessionStore: Send + Sync + 'static {
    fn privilege(&self, headers: &HeaderMap) -> Option<u32>;
}

impl<F> SessionStore for F
where
    F: Fn(&HeaderMap) -> Option<u32> + Send + Sync + 'static,
{
    fn privilege(&self, headers: &HeaderMap) -> Option<u32> {
        self(headers)
    }
}

/// Everything a connection task needs, shared behind one `Arc`.
struct App {
    router: Router,
    sessions: Box<dyn SessionStore>,
    render: BoxedRender,
}

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections, routing every request through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(
        self,
        router: Router,
        sessions: impl SessionStore,
        render: impl Render,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        let app = Arc::new(App {
            router,
            sessions: Box::new(sessions),
            render: render.into_boxed_render(),
        });

        info!(addr = %self.addr, "turnstile listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM stops accepting at once,
                // even if more connections are queued.
                biased;

                () = &mut shutdown => {
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

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("turnstile stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and produces one response. Never fails: every routing
/// failure is already a redirect.
///
/// Routing runs on the blocking pool, since page existence checks and
/// handlers may touch the filesystem. A handler that panics yields
/// `500 Internal Server Error`.
async fn dispatch<B>(
    app: Arc<App>,
    req: hyper::Request<B>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let request = context(&app, &req);
    let routing = Arc::clone(&app);
    let routed = tokio::task::spawn_blocking(move || {
        let outcome = routing.router.process(&request);
        (request, outcome)
    })
    .await;

    let response = match routed {
        Ok((request, Outcome::Page(name))) => app.render.call(Page::new(name, request)).await,
        Ok((request, Outcome::Redirect(target))) => {
            debug!(path = request.path(), %target, "redirecting");
            Response::redirect(&target)
        }
        Err(e) => {
            error!(path = req.uri().path(), "routing failed: {e}");
            Response::builder()
                .status(http::StatusCode::INTERNAL_SERVER_ERROR)
                .bytes(ContentType::Text, b"internal server error".to_vec())
        }
    };
    Ok(response.into_inner())
}

/// Router-facing view of a hyper request.
fn context<B>(app: &App, req: &hyper::Request<B>) -> Request {
    let host = req
        .headers()
        .get(http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default();

    Request::new(req.method().as_str(), req.uri().path())
        .host(host)
        .privilege(app.sessions.privilege(req.headers()))
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On non-Unix platforms
/// only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{Entry, RouteTree};
    use crate::Method;

    async fn echo(page: Page) -> String {
        format!("{}:{}", page.name(), page.request().session_privilege())
    }

    fn app() -> Arc<App> {
        let router = Router::builder()
            .routes(RouteTree::new().method(
                "profile",
                Method::Get,
                Entry::new().page("profile.html").privilege(1).redirect("login"),
            ))
            .default_redirect("home")
            .prod_domain_redirect("example.com", "soon", |_| true)
            .pages(|_: &str| true)
            .build()
            .unwrap();
        serving(router)
    }

    fn serving(router: Router) -> Arc<App> {
        Arc::new(App {
            router,
            sessions: Box::new(|h: &HeaderMap| {
                h.get("x-privilege")?.to_str().ok()?.parse::<u32>().ok()
            }),
            render: echo.into_boxed_render(),
        })
    }

    fn request(path: &str, host: &str, privilege: Option<&str>) -> hyper::Request<()> {
        let mut b = http::Request::builder().method("GET").uri(path).header("host", host);
        if let Some(p) = privilege {
            b = b.header("x-privilege", p);
        }
        b.body(()).unwrap()
    }

    #[tokio::test]
    async fn denied_request_gets_302() {
        let res = dispatch(app(), request("/profile", "localhost", None)).await.unwrap();
        assert_eq!(res.status(), http::StatusCode::FOUND);
        assert_eq!(res.headers()["location"], "/login");
    }

    #[tokio::test]
    async fn granted_request_is_rendered() {
        let res = dispatch(app(), request("/profile?x=1", "localhost", Some("3"))).await.unwrap();
        assert_eq!(res.status(), http::StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn prod_host_is_redirected_first() {
        let res = dispatch(app(), request("/profile", "www.example.com", Some("3"))).await.unwrap();
        assert_eq!(res.headers()["location"], "/soon");
    }

    #[tokio::test]
    async fn panicking_handler_yields_500() {
        let router = Router::builder()
            .routes(RouteTree::new().route(
                "boom",
                Entry::new().page("boom.html").handler(|_| panic!("handler failed")),
            ))
            .pages(|_: &str| true)
            .build()
            .unwrap();
        let res = dispatch(serving(router), request("/boom", "localhost", None)).await.unwrap();
        assert_eq!(res.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
    }

    #[test]
    fn context_reads_host_and_session() {
        let app = app();
        let req = context(&app, &request("/a/b", "site.test", Some("4")));
        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/a/b");
        assert_eq!(req.host_name(), "site.test");
        assert_eq!(req.session_privilege(), 4);
    }
}
