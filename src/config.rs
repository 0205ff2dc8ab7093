//! Route tables as TOML.
//!
//! Everything a [`RouterBuilder`] takes that can be written down as data:
//! defaults, the page root, and the nested route table. Privilege
//! predicates, handler bodies, and the production-host rule are code, so
//! they are added to the builder returned by
//! [`RouterConfig::into_builder`].
//!
//! A node is either an entry:
//!
//! ```toml
//! [routes.admin]
//! privilege = 5
//! redirect = "login"
//!
//! [routes.admin.routes.users]
//! page = "pages/admin/users.html"
//! handler = "audit"
//! ```
//!
//! or a table keyed by method, each value an entry:
//!
//! ```toml
//! [routes.profile.GET]
//! page = "pages/profile.html"
//! privilege = 1
//! redirect = "login"
//! ```

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::Error;
use crate::method::Method;
use crate::pages::FsPages;
use crate::route::{Entry, RouteNode, RouteTree};
use crate::router::{Router, RouterBuilder};

/// Root of a route-table file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Privilege required where an entry declares none.
    pub default_privilege: u32,

    /// Overrides `default_privilege` for `POST` requests.
    pub default_privilege_post: Option<u32>,

    /// Redirect target where a failing entry names none.
    pub default_redirect: String,

    /// Page served for `/` when there is no `""` route.
    pub index_page: Option<String>,

    /// Maximum path depth; deeper requests are redirected.
    pub max_depth: Option<usize>,

    /// Directory page identifiers are relative to.
    pub pages_root: Option<PathBuf>,

    pub routes: BTreeMap<String, NodeConfig>,
}

/// A route node as written in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodeConfig {
    Direct(EntryConfig),
    Methods(BTreeMap<String, EntryConfig>),
}

/// A route entry as written in TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    pub page: Option<String>,
    /// Name of a handler registered with [`RouterBuilder::handler`].
    pub handler: Option<String>,
    pub privilege: Option<u32>,
    pub redirect: Option<String>,
    #[serde(default)]
    pub routes: BTreeMap<String, NodeConfig>,
}

impl RouterConfig {
    /// Reads and parses a TOML route table.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), routes = config.routes.len(), "route table loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    /// Converts into a builder, ready for handlers and predicates.
    ///
    /// Fails with [`Error::InvalidMethod`] on a method key that is not an
    /// HTTP method.
    pub fn into_builder(self) -> Result<RouterBuilder, Error> {
        let mut builder = Router::builder()
            .routes(tree(self.routes)?)
            .default_privilege_get(self.default_privilege)
            .default_redirect(self.default_redirect);

        if let Some(level) = self.default_privilege_post {
            builder = builder.default_privilege(Method::Post, level);
        }
        if let Some(page) = self.index_page {
            builder = builder.index_page(page);
        }
        if let Some(depth) = self.max_depth {
            builder = builder.max_depth(depth);
        }
        if let Some(root) = self.pages_root {
            builder = builder.pages(FsPages::new(root));
        }
        Ok(builder)
    }
}

fn tree(nodes: BTreeMap<String, NodeConfig>) -> Result<RouteTree, Error> {
    nodes.into_iter().try_fold(RouteTree::new(), |tree, (segment, node)| {
        let node = match node {
            NodeConfig::Direct(entry) => RouteNode::Direct(entry.into_entry()?),
            NodeConfig::Methods(table) => RouteNode::Methods(
                table
                    .into_iter()
                    .map(|(method, entry)| Ok((method.parse::<Method>()?, entry.into_entry()?)))
                    .collect::<Result<HashMap<_, _>, Error>>()?,
            ),
        };
        Ok(tree.node(segment, node))
    })
}

impl EntryConfig {
    fn into_entry(self) -> Result<Entry, Error> {
        let mut entry = Entry::new();
        if let Some(page) = self.page {
            entry = entry.page(page);
        }
        if let Some(name) = self.handler {
            entry = entry.handler_named(name);
        }
        if let Some(level) = self.privilege {
            entry = entry.privilege(level);
        }
        if let Some(target) = self.redirect {
            entry = entry.redirect(target);
        }
        if !self.routes.is_empty() {
            entry = entry.subroutes(tree(self.routes)?);
        }
        Ok(entry)
    }
}
