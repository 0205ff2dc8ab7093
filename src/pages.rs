//! Page resources.
//!
//! The router only ever asks one question about a page: does it exist? A
//! [`PageStore`] answers it. [`FsPages`] answers from the filesystem; any
//! `Fn(&str) -> bool` closure works too, which is what tests use.
//!
//! [`serve_file`] is the matching renderer for [`Server`](crate::Server):
//! it reads the resolved page from disk and sends it as HTML.

use std::path::{Component, Path, PathBuf};

use http::StatusCode;
use tracing::warn;

use crate::render::Page;
use crate::response::{ContentType, Response};

/// Existence check for page identifiers.
///
/// Called synchronously while routing and may block; the server routes on
/// tokio's blocking pool.
pub trait PageStore: Send + Sync + 'static {
    fn exists(&self, page: &str) -> bool;
}

impl<F> PageStore for F
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    fn exists(&self, page: &str) -> bool {
        self(page)
    }
}

/// Pages are files below a root directory.
///
/// Identifiers are relative paths (`"pages/home.html"`). Identifiers that
/// are absolute or climb out of the root with `..` never exist.
#[derive(Clone, Debug)]
pub struct FsPages {
    root: PathBuf,
}

impl FsPages {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem location of `page`, or `None` if it escapes the root.
    pub fn locate(&self, page: &str) -> Option<PathBuf> {
        let rel = Path::new(page);
        let contained = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(rel))
    }

    /// Reads the page file and wraps it in a `200 OK` HTML response.
    ///
    /// A page that vanished between resolution and rendering yields
    /// `404 Not Found`.
    pub async fn render(&self, page: Page) -> Response {
        let Some(path) = self.locate(page.name()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };
        match tokio::fs::read(&path).await {
            Ok(body) => Response::builder().bytes(ContentType::Html, body),
            Err(e) => {
                warn!(page = page.name(), path = %path.display(), "page read failed: {e}");
                Response::status(StatusCode::NOT_FOUND)
            }
        }
    }
}

impl Default for FsPages {
    /// Pages relative to the working directory.
    fn default() -> Self {
        Self::new(".")
    }
}

impl PageStore for FsPages {
    fn exists(&self, page: &str) -> bool {
        self.locate(page).is_some_and(|p| p.is_file())
    }
}

/// Renderer that serves the resolved page file from the working directory
/// as `text/html`.
///
/// Use [`FsPages::render`] when pages live under another root.
pub async fn serve_file(page: Page) -> Response {
    FsPages::default().render(page).await
}
