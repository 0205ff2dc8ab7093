//! Unified error type.

use std::fmt;

/// The error type returned by turnstile's fallible operations.
///
/// Routing failures (no match, denied privilege, missing page) are never
/// errors: they resolve to an [`Outcome::Redirect`](crate::Outcome). This
/// type surfaces configuration mistakes caught while building a
/// [`Router`](crate::Router) and infrastructure failures in the
/// [`Server`](crate::Server).
#[derive(Debug)]
pub enum Error {
    /// Binding, accepting, or reading a configuration file.
    Io(std::io::Error),
    /// A route table that is not valid TOML or does not fit the schema.
    Config(toml::de::Error),
    /// A route references a handler name that was never registered.
    UnknownHandler { name: String },
    /// A method-keyed route uses a key that is not an HTTP method.
    InvalidMethod { method: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::UnknownHandler { name } => write!(f, "unknown handler `{name}`"),
            Self::InvalidMethod { method } => write!(f, "invalid method `{method}` in route table"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::UnknownHandler { .. } | Self::InvalidMethod { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e)
    }
}
