//! Request context seen by the router.

/// What the router needs to know about an incoming request.
///
/// The [`Server`](crate::Server) builds one from the wire; tests and other
/// front ends build one by hand:
///
/// ```rust
/// use turnstile::Request;
///
/// let req = Request::new("GET", "/profile/edit?tab=2")
///     .host("www.example.com")
///     .privilege(Some(2));
///
/// assert_eq!(req.segments(), ["", "profile", "edit"]);
/// assert_eq!(req.normalized_host(), "example.com");
/// ```
#[derive(Clone, Debug)]
pub struct Request {
    method: String,
    path: String,
    host: String,
    privilege: Option<u32>,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            host: String::new(),
            privilege: None,
        }
    }

    /// Sets the `Host` the request was addressed to.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the privilege read from the caller's session. `None` means no
    /// session value; it ranks as 0.
    pub fn privilege(mut self, privilege: Option<u32>) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn method(&self) -> &str { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn host_name(&self) -> &str { &self.host }

    /// Session privilege, with an absent value treated as 0.
    pub fn session_privilege(&self) -> u32 {
        self.privilege.unwrap_or(0)
    }

    /// Host with a single leading `www.` removed. Comparison is
    /// case-sensitive, so no case folding happens here.
    pub fn normalized_host(&self) -> &str {
        self.host.strip_prefix("www.").unwrap_or(&self.host)
    }

    /// Path split on `/`, query string discarded.
    ///
    /// Index 0 is the empty segment before the leading slash, so the first
    /// real segment sits at index 1.
    pub fn segments(&self) -> Vec<&str> {
        let path = self.path.split_once('?').map_or(self.path.as_str(), |(p, _)| p);
        path.split('/').collect()
    }
}
