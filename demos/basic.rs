//! Minimal turnstile site: a public home page, a member profile, an admin
//! area, and a maintenance switch for the production host.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i http://localhost:3000/profile                       → 302 /login
//!   curl -i -H 'x-privilege: 1' http://localhost:3000/profile   → profile page
//!   curl -i -H 'x-privilege: 5' http://localhost:3000/admin/users/42
//!   curl -i http://localhost:3000/nowhere                       → 302 /

use std::sync::atomic::{AtomicBool, Ordering};

use http::HeaderMap;
use turnstile::{Entry, Method, Page, Response, RouteTree, Router, Server};

static MAINTENANCE: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let routes = RouteTree::new()
        .route("", Entry::new().page("home"))
        .route("login", Entry::new().page("login"))
        .method("profile", Method::Get, Entry::new()
            .page("profile")
            .privilege(1)
            .redirect("login"))
        .route("admin", Entry::new()
            .privilege(5)
            .redirect("login")
            .subroutes(RouteTree::new()
                .route("users", Entry::new()
                    .page("admin-users")
                    .handler_named("audit"))));

    let router = Router::builder()
        .routes(routes)
        .handler("audit", |args| tracing::info!(?args, "admin users opened"))
        .prod_domain_redirect("example.com", "login", |req| {
            MAINTENANCE.load(Ordering::Relaxed) && req.path() != "/login"
        })
        .pages(|page: &str| matches!(page, "home" | "login" | "profile" | "admin-users"))
        .build()
        .expect("route table");

    Server::bind("0.0.0.0:3000")
        .serve(router, session, render)
        .await
        .expect("server error");
}

// Stand-in for a real session lookup: trust a header.
fn session(headers: &HeaderMap) -> Option<u32> {
    headers.get("x-privilege")?.to_str().ok()?.parse().ok()
}

// Pages here are names, not files; render each as a tiny HTML document.
async fn render(page: Page) -> Response {
    Response::html(format!(
        "<!doctype html><title>{name}</title><h1>{name}</h1><p>{path}</p>",
        name = page.name(),
        path = page.request().path(),
    ))
}
