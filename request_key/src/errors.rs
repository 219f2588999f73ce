use thiserror::Error;

/// The parameters of a request were not a key-value mapping.
///
/// This usually means something like an HTTP method or a bare string was passed where a
/// params object was expected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("request params must be a key-value mapping, found {found}")]
pub struct InvalidParamsError {
    /// The kind of JSON value that was passed instead.
    pub found: &'static str,
}

/// Errors raised by a [`Middleware`](crate::Middleware) while rewriting a request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// The request path was empty.
    #[error("request path is empty")]
    EmptyPath,
    /// The request path contains a character that cannot appear in a request path.
    #[error("request path {path:?} contains disallowed character {found:?}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// The first disallowed character.
        found: char,
    },
    /// A `:name` segment of the path has no matching parameter.
    #[error("could not find parameter {0}")]
    MissingParam(String),
    /// A `:name` segment matched a parameter that cannot be written into a path.
    #[error("parameter {name} is a {found} and cannot be used in a path")]
    UnsupportedParam {
        /// The parameter name.
        name: String,
        /// The kind of JSON value it holds.
        found: &'static str,
    },
}
