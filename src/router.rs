//! Privilege-gated page router.
//!
//! Registration happens on a [`RouterBuilder`]; [`RouterBuilder::build`]
//! freezes it into a [`Router`] that is immutable, `Send + Sync`, and meant
//! to be shared behind an `Arc`. Each request walks the path one segment at
//! a time, checking the privilege gate of every entry it passes through.
//! The walk ends in an [`Outcome`]: the page to render, or where to
//! redirect. The router never writes a response itself.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::method::Method;
use crate::pages::{FsPages, PageStore};
use crate::request::Request;
use crate::route::{Entry, Handler, HandlerRef, Predicate, Privilege, RouteTree};

/// Default bound on the number of path segments the router will walk.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Result of routing one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Access granted; render this page.
    Page(String),
    /// Send the client to `/{target}`.
    Redirect(String),
}

impl Outcome {
    pub fn page(&self) -> Option<&str> {
        match self {
            Self::Page(p) => Some(p),
            Self::Redirect(_) => None,
        }
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Page(_) => None,
            Self::Redirect(t) => Some(t),
        }
    }
}

/// Terminal failure while walking the tree; carries the redirect target.
struct Redirect(String);

struct ProdRedirect {
    host: String,
    target: String,
    guard: Predicate,
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Registration phase of a [`Router`].
///
/// ```rust
/// use turnstile::{Entry, Method, Outcome, Request, RouteTree, Router};
///
/// let router = Router::builder()
///     .routes(RouteTree::new().method("profile", Method::Get, Entry::new()
///         .page("profile.html")
///         .privilege(1)
///         .redirect("login")))
///     .default_redirect("home")
///     .pages(|_: &str| true)
///     .build()
///     .unwrap();
///
/// let guest = Request::new("GET", "/profile");
/// assert_eq!(router.process(&guest), Outcome::Redirect("login".into()));
///
/// let member = Request::new("GET", "/profile").privilege(Some(2));
/// assert_eq!(router.process(&member), Outcome::Page("profile.html".into()));
///
/// let lost = Request::new("GET", "/unknown");
/// assert_eq!(router.process(&lost), Outcome::Redirect("home".into()));
/// ```
pub struct RouterBuilder {
    tree: RouteTree,
    default_privilege: u32,
    method_privilege: HashMap<Method, u32>,
    default_redirect: String,
    prod_redirect: Option<ProdRedirect>,
    index_page: Option<String>,
    max_depth: usize,
    pages: Option<Arc<dyn PageStore>>,
    handlers: HashMap<String, Handler>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self {
            tree: RouteTree::new(),
            default_privilege: 0,
            method_privilege: HashMap::new(),
            default_redirect: String::new(),
            prod_redirect: None,
            index_page: None,
            max_depth: DEFAULT_MAX_DEPTH,
            pages: None,
            handlers: HashMap::new(),
        }
    }

    /// Deep-merges `tree` into the routes registered so far.
    ///
    /// See [`RouteTree::merge`] for how overlapping segments combine.
    pub fn routes(mut self, tree: RouteTree) -> Self {
        self.tree.merge(tree);
        self
    }

    /// Privilege required by entries that declare none. Defaults to 0.
    pub fn default_privilege_get(mut self, level: u32) -> Self {
        self.default_privilege = level;
        self
    }

    /// Default privilege for requests using `method`, overriding
    /// [`default_privilege_get`](Self::default_privilege_get) for them.
    pub fn default_privilege(mut self, method: Method, level: u32) -> Self {
        self.method_privilege.insert(method, level);
        self
    }

    /// Redirect target used when a failing entry names none. Defaults to
    /// the empty target, the site root.
    pub fn default_redirect(mut self, target: impl Into<String>) -> Self {
        self.default_redirect = target.into();
        self
    }

    /// Redirects every request addressed to `host` (ignoring a leading
    /// `www.`) to `target` while `guard` returns `true`, before any route
    /// lookup.
    pub fn prod_domain_redirect(
        mut self,
        host: impl Into<String>,
        target: impl Into<String>,
        guard: impl Fn(&Request) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.prod_redirect = Some(ProdRedirect {
            host: host.into(),
            target: target.into(),
            guard: Arc::new(guard),
        });
        self
    }

    /// Page served for `/` when the root tree has no `""` segment.
    pub fn index_page(mut self, page: impl Into<String>) -> Self {
        self.index_page = Some(page.into());
        self
    }

    /// Paths with more segments than this are redirected to the default
    /// target without being looked up.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Existence check for resolved pages. Defaults to [`FsPages`] in the
    /// working directory.
    pub fn pages(mut self, store: impl PageStore) -> Self {
        self.pages = Some(Arc::new(store));
        self
    }

    /// Registers a handler that entries can reference by `name`.
    pub fn handler(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&[&str]) + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(name.into(), Arc::new(f));
        self
    }

    /// Freezes the registration.
    ///
    /// Fails with [`Error::UnknownHandler`] if any entry names a handler
    /// that was never registered.
    pub fn build(mut self) -> Result<Router, Error> {
        let handlers = &self.handlers;
        self.tree.for_each_entry_mut(&mut |entry: &mut Entry| {
            let resolved = match &entry.handler {
                Some(HandlerRef::Named(name)) => handlers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownHandler { name: name.clone() })?,
                _ => return Ok(()),
            };
            entry.handler = Some(HandlerRef::Fn(resolved));
            Ok::<(), Error>(())
        })?;

        debug!(
            segments = self.tree.len(),
            default_privilege = self.default_privilege,
            default_redirect = %self.default_redirect,
            "router built"
        );

        Ok(Router {
            tree: self.tree,
            default_privilege: self.default_privilege,
            method_privilege: self.method_privilege,
            default_redirect: self.default_redirect,
            prod_redirect: self.prod_redirect,
            index_page: self.index_page,
            max_depth: self.max_depth,
            pages: self
                .pages
                .unwrap_or_else(|| Arc::new(FsPages::default()) as Arc<dyn PageStore>),
        })
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The application router. Build it once at startup via [`Router::builder`].
pub struct Router {
    tree: RouteTree,
    default_privilege: u32,
    method_privilege: HashMap<Method, u32>,
    default_redirect: String,
    prod_redirect: Option<ProdRedirect>,
    index_page: Option<String>,
    max_depth: usize,
    pages: Arc<dyn PageStore>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Routes one request.
    ///
    /// Handlers on granted entries run as a side effect, even when the walk
    /// later ends in a redirect.
    pub fn process(&self, req: &Request) -> Outcome {
        if let Some(rule) = &self.prod_redirect {
            if req.normalized_host() == rule.host && (rule.guard)(req) {
                debug!(host = req.host_name(), target = %rule.target, "production host redirect");
                return Outcome::Redirect(rule.target.clone());
            }
        }

        let segments = req.segments();
        // a trailing slash ends the path, it is not a level
        let trailing = segments.len() > 1 && segments.last() == Some(&"");
        let depth = segments.len() - 1 - usize::from(trailing);
        if depth > self.max_depth {
            warn!(depth, max = self.max_depth, "path too deep");
            return Outcome::Redirect(self.default_redirect.clone());
        }

        let method = req.method().parse::<Method>().ok();
        let outcome = match self.resolve(&self.tree, req, method, &segments, 1) {
            Ok(Some(page)) => Outcome::Page(page),
            Ok(None) => Outcome::Redirect(self.default_redirect.clone()),
            Err(Redirect(target)) => Outcome::Redirect(target),
        };
        debug!(method = req.method(), path = req.path(), ?outcome, "routed");
        outcome
    }

    fn default_privilege_for(&self, method: Option<Method>) -> u32 {
        method
            .and_then(|m| self.method_privilege.get(&m).copied())
            .unwrap_or(self.default_privilege)
    }

    /// Resolves `segments[index]` against `tree`.
    ///
    /// `Ok(None)` means the path ran out before this level. `Err` is a
    /// terminal redirect that unwinds the whole walk.
    fn resolve(
        &self,
        tree: &RouteTree,
        req: &Request,
        method: Option<Method>,
        segments: &[&str],
        index: usize,
    ) -> Result<Option<String>, Redirect> {
        let redirect = self.default_redirect.as_str();

        let Some(&segment) = segments.get(index) else {
            return Ok(None);
        };

        let Some(entry) = tree.get(segment).and_then(|node| node.entry_for(method)) else {
            if segment.is_empty() {
                let last = index + 1 == segments.len();
                if index == 1 {
                    if let Some(page) = &self.index_page {
                        return self.checked(page.clone(), redirect).map(Some);
                    }
                } else if last {
                    // trailing slash
                    return Ok(None);
                }
            }
            trace!(segment, index, "no route");
            return Err(Redirect(redirect.to_owned()));
        };

        let default = Privilege::Level(self.default_privilege_for(method));
        let privilege = entry.privilege.as_ref().unwrap_or(&default);
        if !privilege.allows(req) {
            let target = entry.redirect.as_deref().unwrap_or(redirect);
            debug!(segment, ?privilege, target, "privilege denied");
            return Err(Redirect(target.to_owned()));
        }

        // named references were swapped for closures in `build`
        if let Some(HandlerRef::Fn(f)) = &entry.handler {
            f(&segments[index + 1..]);
        }

        if let Some(sub) = entry.subroutes.as_ref().filter(|t| !t.is_empty()) {
            if let Some(page) = self.resolve(sub, req, method, segments, index + 1)? {
                return Ok(Some(page));
            }
        }

        match &entry.page {
            Some(page) => self.checked(page.clone(), redirect).map(Some),
            None => Err(Redirect(redirect.to_owned())),
        }
    }

    fn checked(&self, page: String, redirect: &str) -> Result<String, Redirect> {
        if self.pages.exists(&page) {
            Ok(page)
        } else {
            debug!(page = %page, "page missing");
            Err(Redirect(redirect.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn router(tree: RouteTree) -> RouterBuilder {
        Router::builder().routes(tree).default_redirect("home").pages(|_: &str| true)
    }

    fn get(path: &str, privilege: Option<u32>) -> Request {
        Request::new("GET", path).privilege(privilege)
    }

    fn page(p: &str) -> Outcome {
        Outcome::Page(p.to_owned())
    }

    fn redirect(t: &str) -> Outcome {
        Outcome::Redirect(t.to_owned())
    }

    type Calls = Arc<Mutex<Vec<Vec<String>>>>;

    fn recorder() -> (Calls, impl Fn(&[&str]) + Clone + Send + Sync + 'static) {
        let calls: Calls = Arc::default();
        let sink = Arc::clone(&calls);
        let f = move |args: &[&str]| {
            sink.lock().unwrap().push(args.iter().map(|s| s.to_string()).collect());
        };
        (calls, f)
    }

    #[test]
    fn ungated_route_returns_its_page() {
        let r = router(RouteTree::new().route("about", Entry::new().page("about.html")))
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/about", None)), page("about.html"));
        assert_eq!(r.process(&get("/about?lang=en", None)), page("about.html"));
    }

    #[test]
    fn level_boundary_is_inclusive() {
        let r = router(RouteTree::new().route(
            "vault",
            Entry::new().page("vault.html").privilege(5).redirect("login"),
        ))
        .build()
        .unwrap();
        assert_eq!(r.process(&get("/vault", Some(5))), page("vault.html"));
        assert_eq!(r.process(&get("/vault", Some(4))), redirect("login"));
        assert_eq!(r.process(&get("/vault", None)), redirect("login"));
    }

    #[test]
    fn false_predicate_always_redirects() {
        let r = router(RouteTree::new().route(
            "closed",
            Entry::new().page("closed.html").allow_if(|_| false).redirect("sorry"),
        ))
        .build()
        .unwrap();
        for level in [None, Some(0), Some(100)] {
            assert_eq!(r.process(&get("/closed", level)), redirect("sorry"));
        }
    }

    #[test]
    fn denial_without_redirect_uses_default() {
        let r = router(RouteTree::new().route("x", Entry::new().page("x.html").privilege(1)))
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/x", None)), redirect("home"));
    }

    #[test]
    fn predicate_sees_request() {
        let r = router(RouteTree::new().route(
            "beta",
            Entry::new().page("beta.html").allow_if(|req| req.host_name() == "beta.local"),
        ))
        .build()
        .unwrap();
        assert_eq!(r.process(&get("/beta", None).host("beta.local")), page("beta.html"));
        assert_eq!(r.process(&get("/beta", None).host("prod.local")), redirect("home"));
    }

    #[test]
    fn depth_two_page_needs_full_path() {
        let r = router(RouteTree::new().route(
            "docs",
            Entry::new().subroutes(RouteTree::new().route("intro", Entry::new().page("intro.html"))),
        ))
        .build()
        .unwrap();
        assert_eq!(r.process(&get("/docs", None)), redirect("home"));
        assert_eq!(r.process(&get("/docs/intro", None)), page("intro.html"));
        assert_eq!(r.process(&get("/docs/outro", None)), redirect("home"));
    }

    #[test]
    fn parent_page_stands_when_path_ends() {
        let r = router(RouteTree::new().route(
            "docs",
            Entry::new()
                .page("docs.html")
                .subroutes(RouteTree::new().route("intro", Entry::new().page("intro.html"))),
        ))
        .build()
        .unwrap();
        assert_eq!(r.process(&get("/docs", None)), page("docs.html"));
        assert_eq!(r.process(&get("/docs/", None)), page("docs.html"));
        assert_eq!(r.process(&get("/docs/intro", None)), page("intro.html"));
    }

    #[test]
    fn shallow_denial_short_circuits() {
        let (calls, f) = recorder();
        let r = router(RouteTree::new().route(
            "admin",
            Entry::new().privilege(5).redirect("login").subroutes(
                RouteTree::new().route("users", Entry::new().page("users.html").handler(f)),
            ),
        ))
        .build()
        .unwrap();
        assert_eq!(r.process(&get("/admin/users", Some(1))), redirect("login"));
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(r.process(&get("/admin/users", Some(5))), page("users.html"));
    }

    #[test]
    fn handler_gets_trailing_segments_once() {
        let (calls, f) = recorder();
        let (sibling_calls, g) = recorder();
        let r = router(
            RouteTree::new()
                .route("post", Entry::new().page("post.html").handler(f))
                .route("draft", Entry::new().page("draft.html").handler(g).privilege(9)),
        )
        .build()
        .unwrap();

        assert_eq!(r.process(&get("/post/2024/hello", None)), page("post.html"));
        assert_eq!(*calls.lock().unwrap(), vec![vec!["2024".to_owned(), "hello".to_owned()]]);
        assert!(sibling_calls.lock().unwrap().is_empty());

        // the sibling's own gate denies, so its handler never runs
        assert_eq!(r.process(&get("/draft/1", Some(8))), redirect("home"));
        assert!(sibling_calls.lock().unwrap().is_empty());
        assert_eq!(r.process(&get("/draft/1", Some(9))), page("draft.html"));
        assert_eq!(sibling_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn denied_entry_skips_its_handler_and_uses_its_redirect() {
        let (calls, f) = recorder();
        let r = router(RouteTree::new().route(
            "draft",
            Entry::new().page("draft.html").privilege(9).redirect("login").handler(f),
        ))
        .build()
        .unwrap();
        assert_eq!(r.process(&get("/draft", None)), redirect("login"));
        assert_eq!(r.process(&get("/draft", Some(8))), redirect("login"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn handler_runs_even_without_page() {
        let (calls, f) = recorder();
        let r = router(RouteTree::new().route("logout", Entry::new().handler(f).redirect("bye")))
            .build()
            .unwrap();
        // no page: falls through to the default redirect, not the entry's
        assert_eq!(r.process(&get("/logout", None)), redirect("home"));
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(calls.lock().unwrap()[0].is_empty());
    }

    #[test]
    fn method_table_does_not_fall_back() {
        let r = router(
            RouteTree::new()
                .method("form", Method::Get, Entry::new().page("form.html"))
                .method("form", Method::Post, Entry::new().page("sent.html")),
        )
        .build()
        .unwrap();
        assert_eq!(r.process(&Request::new("GET", "/form")), page("form.html"));
        assert_eq!(r.process(&Request::new("POST", "/form")), page("sent.html"));
        assert_eq!(r.process(&Request::new("DELETE", "/form")), redirect("home"));
        assert_eq!(r.process(&Request::new("BREW", "/form")), redirect("home"));
    }

    #[test]
    fn direct_entry_answers_any_method() {
        let r = router(RouteTree::new().route("any", Entry::new().page("any.html")))
            .build()
            .unwrap();
        assert_eq!(r.process(&Request::new("PUT", "/any")), page("any.html"));
        assert_eq!(r.process(&Request::new("BREW", "/any")), page("any.html"));
    }

    #[test]
    fn missing_page_redirects() {
        let r = Router::builder()
            .routes(RouteTree::new().route("gone", Entry::new().page("gone.html")))
            .default_redirect("home")
            .pages(|p: &str| p != "gone.html")
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/gone", None)), redirect("home"));
    }

    #[test]
    fn per_method_default_privilege() {
        let r = router(RouteTree::new().route("comment", Entry::new().page("comment.html")))
            .default_privilege_get(0)
            .default_privilege(Method::Post, 2)
            .build()
            .unwrap();
        assert_eq!(r.process(&Request::new("GET", "/comment")), page("comment.html"));
        assert_eq!(r.process(&Request::new("POST", "/comment")), redirect("home"));
        assert_eq!(
            r.process(&Request::new("POST", "/comment").privilege(Some(2))),
            page("comment.html")
        );
    }

    #[test]
    fn default_privilege_gates_unmarked_routes() {
        let r = router(RouteTree::new().route("x", Entry::new().page("x.html")))
            .default_privilege_get(1)
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/x", None)), redirect("home"));
        assert_eq!(r.process(&get("/x", Some(1))), page("x.html"));
    }

    fn shop(guard: bool, f: impl Fn(&[&str]) + Send + Sync + 'static) -> Router {
        router(RouteTree::new().route("shop", Entry::new().page("shop.html").handler(f)))
            .prod_domain_redirect("example.com", "maintenance", move |_| guard)
            .build()
            .unwrap()
    }

    #[test]
    fn prod_rule_runs_before_lookup() {
        let (calls, f) = recorder();

        let on = shop(true, f.clone());
        for host in ["example.com", "www.example.com"] {
            assert_eq!(on.process(&get("/shop", None).host(host)), redirect("maintenance"));
        }
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(on.process(&get("/shop", None).host("Example.com")), page("shop.html"));
        assert_eq!(calls.lock().unwrap().len(), 1);

        let off = shop(false, f);
        assert_eq!(off.process(&get("/shop", None).host("example.com")), page("shop.html"));
    }

    #[test]
    fn index_page_serves_root_only() {
        let r = router(RouteTree::new().route(
            "docs",
            Entry::new().subroutes(RouteTree::new().route("a", Entry::new().page("a.html"))),
        ))
        .index_page("index.html")
        .build()
        .unwrap();
        assert_eq!(r.process(&get("/", None)), page("index.html"));
        assert_eq!(r.process(&get("/docs/", None)), redirect("home"));
    }

    #[test]
    fn empty_segment_key_beats_index_page() {
        let r = router(RouteTree::new().route("", Entry::new().page("home.html")))
            .index_page("index.html")
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/", None)), page("home.html"));
    }

    #[test]
    fn deep_paths_fail_closed() {
        let r = router(RouteTree::new().route("a", Entry::new().page("a.html").handler(|_| {})))
            .max_depth(3)
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/a/b/c", None)), page("a.html"));
        assert_eq!(r.process(&get("/a/b/c/d", None)), redirect("home"));
    }

    #[test]
    fn trailing_slash_is_not_a_level() {
        let r = router(RouteTree::new().route("a", Entry::new().page("a.html")))
            .max_depth(1)
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/a", None)), page("a.html"));
        assert_eq!(r.process(&get("/a/", None)), page("a.html"));
        assert_eq!(r.process(&get("/a/b", None)), redirect("home"));
    }

    #[test]
    fn named_handlers_resolve_at_build() {
        let (calls, f) = recorder();
        let r = router(RouteTree::new().route("hook", Entry::new().page("h.html").handler_named("hook")))
            .handler("hook", f)
            .build()
            .unwrap();
        r.process(&get("/hook/x", None));
        assert_eq!(*calls.lock().unwrap(), vec![vec!["x".to_owned()]]);

        let err = router(RouteTree::new().route(
            "a",
            Entry::new().subroutes(RouteTree::new().route("b", Entry::new().handler_named("nope"))),
        ))
        .build()
        .err()
        .unwrap();
        assert!(matches!(err, Error::UnknownHandler { name } if name == "nope"));
    }

    #[test]
    fn registration_merges_trees() {
        let r = router(RouteTree::new().route("a", Entry::new().page("a.html")))
            .routes(RouteTree::new().route("b", Entry::new().page("b.html")))
            .routes(RouteTree::new().route("a", Entry::new().privilege(3)))
            .build()
            .unwrap();
        assert_eq!(r.process(&get("/b", None)), page("b.html"));
        assert_eq!(r.process(&get("/a", None)), redirect("home"));
        assert_eq!(r.process(&get("/a", Some(3))), page("a.html"));
    }
}
