//! # turnstile
//!
//! A page router for server-rendered sites, with a privilege gate on every
//! route. Nothing more.
//!
//! ## The model
//!
//! A route table is a tree that mirrors the URL: one level per path
//! segment. Each node answers either every method or a fixed set of
//! methods. A matched entry can
//!
//! - name a **page** to render,
//! - run a **handler** with the remaining path segments,
//! - demand a **privilege** (a minimum level or a predicate),
//! - name a **redirect** for when that privilege is missing,
//! - hold **subroutes** for the next segment.
//!
//! Routing a request walks the tree and ends in an [`Outcome`]: the page to
//! render, or a redirect. There is no error path. A missing route, a failed
//! gate, and a missing page file all end as a redirect.
//!
//! What turnstile leaves to you:
//!
//! - **Sessions**: the caller's privilege comes from a [`SessionStore`].
//! - **Templates**: the resolved page goes to your renderer, or to
//!   [`pages::serve_file`] for static HTML.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::HeaderMap;
//! use turnstile::{Entry, Method, RouteTree, Router, Server, pages};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder()
//!         .routes(RouteTree::new()
//!             .route("", Entry::new().page("pages/home.html"))
//!             .method("profile", Method::Get, Entry::new()
//!                 .page("pages/profile.html")
//!                 .privilege(1)
//!                 .redirect("login"))
//!             .route("login", Entry::new().page("pages/login.html")))
//!         .default_redirect("")
//!         .build()
//!         .unwrap();
//!
//!     let sessions = |_: &HeaderMap| -> Option<u32> { None };
//!
//!     Server::bind("0.0.0.0:3000")
//!         .serve(router, sessions, pages::serve_file)
//!         .await
//!         .unwrap();
//! }
//! ```

mod config;
mod error;
mod method;
mod render;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod pages;

pub use config::{EntryConfig, NodeConfig, RouterConfig};
pub use error::Error;
pub use method::Method;
pub use pages::{FsPages, PageStore};
pub use render::{Page, Render};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use route::{Entry, Handler, HandlerRef, Predicate, Privilege, RouteNode, RouteTree};
pub use router::{DEFAULT_MAX_DEPTH, Outcome, Router, RouterBuilder};
pub use server::{Server, SessionStore};
