//! Page renderers and type erasure.
//!
//! The router decides *which* page a request gets; a renderer turns that
//! decision into bytes. The [`Server`](crate::Server) holds exactly one
//! renderer, shared across every connection task:
//!
//! ```text
//! async fn render(page: Page) -> Response { … }   ← user writes this
//!        ↓ server.serve(router, sessions, render)
//! render.into_boxed_render()                      ← Render blanket impl
//!        ↓  stored as BoxedRender = Arc<dyn ErasedRender>
//! renderer.call(page)  per resolved request       ← one vtable dispatch
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A resolved page, handed to the renderer.
#[derive(Clone, Debug)]
pub struct Page {
    name: String,
    request: Request,
}

impl Page {
    pub fn new(name: impl Into<String>, request: Request) -> Self {
        Self { name: name.into(), request }
    }

    /// The page identifier the route table resolved to.
    pub fn name(&self) -> &str { &self.name }

    /// The request that resolved to this page.
    pub fn request(&self) -> &Request { &self.request }
}

// ── Internal types ────────────────────────────────────────────────────────────

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedRender {
    fn call(&self, page: Page) -> BoxFuture;
}

#[doc(hidden)]
pub type BoxedRender = Arc<dyn ErasedRender + Send + Sync + 'static>;

// ── Public Render trait ───────────────────────────────────────────────────────

/// Implemented for every valid page renderer.
///
/// Satisfied automatically by any `async fn` (or closure returning a
/// future) with the signature:
///
/// ```text
/// async fn name(page: Page) -> impl IntoResponse
/// ```
///
/// Sealed: only the blanket impl below can satisfy it.
pub trait Render: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_render(self) -> BoxedRender;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Page) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Render for F
where
    F: Fn(Page) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_render(self) -> BoxedRender {
        Arc::new(FnRender(self))
    }
}

struct FnRender<F>(F);

impl<F, Fut, R> ErasedRender for FnRender<F>
where
    F: Fn(Page) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, page: Page) -> BoxFuture {
        let fut = (self.0)(page);
        Box::pin(async move { fut.await.into_response() })
    }
}
