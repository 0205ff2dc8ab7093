//! Route tree types.
//!
//! A [`RouteTree`] maps one path segment to a [`RouteNode`]. A node is
//! either a per-method table or a single [`Entry`] that answers every
//! method. Entries carry the page, handler, privilege gate, denial
//! redirect, and an optional nested tree for the next segment.
//!
//! ```rust
//! use turnstile::{Entry, Method, RouteTree};
//!
//! let tree = RouteTree::new()
//!     .route("", Entry::new().page("pages/home.html"))
//!     .method("profile", Method::Get, Entry::new()
//!         .page("pages/profile.html")
//!         .privilege(1)
//!         .redirect("login"))
//!     .route("admin", Entry::new()
//!         .privilege(5)
//!         .subroutes(RouteTree::new()
//!             .route("users", Entry::new().page("pages/admin/users.html"))));
//! # let _ = tree;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::method::Method;
use crate::request::Request;

/// A side-effecting route handler. Receives the path segments that follow
/// the matched route, in order.
pub type Handler = Arc<dyn Fn(&[&str]) + Send + Sync + 'static>;

/// A privilege predicate. Decides access from the request alone.
pub type Predicate = Arc<dyn Fn(&Request) -> bool + Send + Sync + 'static>;

// ── Privilege ─────────────────────────────────────────────────────────────────

/// The access requirement of an entry.
#[derive(Clone)]
pub enum Privilege {
    /// Granted when the session privilege is at least this level.
    Level(u32),
    /// Granted when the predicate returns `true`.
    Predicate(Predicate),
}

impl Privilege {
    /// Wraps a closure as a predicate requirement.
    pub fn predicate(f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    pub(crate) fn allows(&self, req: &Request) -> bool {
        match self {
            Self::Level(required) => req.session_privilege() >= *required,
            Self::Predicate(f) => f(req),
        }
    }
}

impl fmt::Debug for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level(n) => f.debug_tuple("Level").field(n).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

// ── HandlerRef ────────────────────────────────────────────────────────────────

/// How an entry refers to its handler.
///
/// Named references come from route tables written as data (see
/// [`RouterConfig`](crate::RouterConfig)) and are resolved against the
/// builder's registry when the router is built.
#[derive(Clone)]
pub enum HandlerRef {
    Fn(Handler),
    Named(String),
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fn(_) => f.write_str("Fn(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

// ── Entry ─────────────────────────────────────────────────────────────────────

/// The routing configuration that applies once method dispatch is done.
///
/// Every field is optional and independent of the others.
#[derive(Clone, Debug, Default)]
pub struct Entry {
    pub(crate) page: Option<String>,
    pub(crate) handler: Option<HandlerRef>,
    pub(crate) privilege: Option<Privilege>,
    pub(crate) redirect: Option<String>,
    pub(crate) subroutes: Option<RouteTree>,
}

impl Entry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page resource returned when this entry is the deepest one granted.
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Handler called with the path segments after this entry's segment.
    pub fn handler(mut self, f: impl Fn(&[&str]) + Send + Sync + 'static) -> Self {
        self.handler = Some(HandlerRef::Fn(Arc::new(f)));
        self
    }

    /// Handler looked up by name in the builder's registry at build time.
    pub fn handler_named(mut self, name: impl Into<String>) -> Self {
        self.handler = Some(HandlerRef::Named(name.into()));
        self
    }

    /// Minimum session privilege level.
    pub fn privilege(self, level: u32) -> Self {
        self.gate(Privilege::Level(level))
    }

    /// Grants access only when `f` returns `true`.
    pub fn allow_if(self, f: impl Fn(&Request) -> bool + Send + Sync + 'static) -> Self {
        self.gate(Privilege::predicate(f))
    }

    pub fn gate(mut self, privilege: Privilege) -> Self {
        self.privilege = Some(privilege);
        self
    }

    /// Where to send the client when this entry's privilege check fails.
    pub fn redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }

    /// Tree consulted for the next path segment.
    pub fn subroutes(mut self, tree: RouteTree) -> Self {
        self.subroutes = Some(tree);
        self
    }

    /// Field-wise merge: `other`'s present fields win, subroutes merge deeply.
    fn merge(&mut self, other: Entry) {
        if other.page.is_some() {
            self.page = other.page;
        }
        if other.handler.is_some() {
            self.handler = other.handler;
        }
        if other.privilege.is_some() {
            self.privilege = other.privilege;
        }
        if other.redirect.is_some() {
            self.redirect = other.redirect;
        }
        match (&mut self.subroutes, other.subroutes) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (slot, theirs @ Some(_)) => *slot = theirs,
            (_, None) => {}
        }
    }
}

// ── RouteNode ─────────────────────────────────────────────────────────────────

/// What a path segment maps to.
#[derive(Clone, Debug)]
pub enum RouteNode {
    /// One entry per method. A method missing from the table does not match.
    Methods(HashMap<Method, Entry>),
    /// One entry for every method.
    Direct(Entry),
}

impl RouteNode {
    /// Selects the entry for `method`. `None` is the method-keyed miss.
    pub(crate) fn entry_for(&self, method: Option<Method>) -> Option<&Entry> {
        match self {
            Self::Methods(table) => method.and_then(|m| table.get(&m)),
            Self::Direct(entry) => Some(entry),
        }
    }

    fn merge(&mut self, other: RouteNode) {
        match (self, other) {
            (Self::Methods(mine), Self::Methods(theirs)) => {
                for (method, entry) in theirs {
                    match mine.get_mut(&method) {
                        Some(existing) => existing.merge(entry),
                        None => {
                            mine.insert(method, entry);
                        }
                    }
                }
            }
            (Self::Direct(mine), Self::Direct(theirs)) => mine.merge(theirs),
            (slot, other) => *slot = other,
        }
    }

    fn entries_mut(&mut self) -> Box<dyn Iterator<Item = &mut Entry> + '_> {
        match self {
            Self::Methods(table) => Box::new(table.values_mut()),
            Self::Direct(entry) => Box::new(std::iter::once(entry)),
        }
    }
}

// ── RouteTree ─────────────────────────────────────────────────────────────────

/// Path segment → [`RouteNode`].
#[derive(Clone, Debug, Default)]
pub struct RouteTree {
    nodes: BTreeMap<String, RouteNode>,
}

impl RouteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `segment` to a method-agnostic entry. Replaces any previous node.
    pub fn route(mut self, segment: impl Into<String>, entry: Entry) -> Self {
        self.nodes.insert(segment.into(), RouteNode::Direct(entry));
        self
    }

    /// Adds `entry` under `method` for `segment`.
    ///
    /// A method-agnostic node already at `segment` is replaced by a method
    /// table.
    pub fn method(mut self, segment: impl Into<String>, method: Method, entry: Entry) -> Self {
        let node = self
            .nodes
            .entry(segment.into())
            .or_insert_with(|| RouteNode::Methods(HashMap::new()));
        match node {
            RouteNode::Methods(table) => {
                table.insert(method, entry);
            }
            RouteNode::Direct(_) => {
                *node = RouteNode::Methods(HashMap::from([(method, entry)]));
            }
        }
        self
    }

    /// Maps `segment` to an arbitrary node. Replaces any previous node.
    pub fn node(mut self, segment: impl Into<String>, node: RouteNode) -> Self {
        self.nodes.insert(segment.into(), node);
        self
    }

    pub fn get(&self, segment: &str) -> Option<&RouteNode> {
        self.nodes.get(segment)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Deep merge of `other` into `self`.
    ///
    /// For a segment present in both trees, two method tables merge per
    /// method, two direct entries merge field by field, and any other pairing
    /// is replaced by `other`'s node. Merging overlapping trees is
    /// order-dependent.
    pub fn merge(&mut self, other: RouteTree) {
        for (segment, node) in other.nodes {
            match self.nodes.get_mut(&segment) {
                Some(existing) => existing.merge(node),
                None => {
                    self.nodes.insert(segment, node);
                }
            }
        }
    }

    /// Visits every entry in the tree, depth first.
    pub(crate) fn for_each_entry_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut Entry) -> Result<(), E>,
    ) -> Result<(), E> {
        for node in self.nodes.values_mut() {
            for entry in node.entries_mut() {
                f(&mut *entry)?;
                if let Some(sub) = entry.subroutes.as_mut() {
                    sub.for_each_entry_mut(f)?;
                }
            }
        }
        Ok(())
    }
}
