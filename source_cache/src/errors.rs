use request_key::{InvalidParamsError, MiddlewareError, RequestKey};
use thiserror::Error;

/// Failure to acquire a cache entry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquireError<E> {
    /// The factory failed synchronously while opening the source. Nothing was cached.
    #[error("source failed to open: {0}")]
    Source(E),
}

impl<E> AcquireError<E> {
    /// Returns the error produced by the source.
    pub fn into_inner(self) -> E {
        match self {
            AcquireError::Source(e) => e,
        }
    }
}

/// A [`Handle`](crate::Handle) was released more than once.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("handle for {key} was already released")]
pub struct DoubleReleaseError {
    /// The key of the entry the handle belonged to.
    pub key: RequestKey,
}

/// Errors that can occur when making a request through a
/// [`RequestClient`](crate::RequestClient).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError<E> {
    /// The params were not a key-value mapping.
    #[error(transparent)]
    InvalidParams(#[from] InvalidParamsError),
    /// A middleware stage rejected the request.
    #[error(transparent)]
    Middleware(#[from] MiddlewareError),
    /// The source failed synchronously while opening.
    #[error("source failed to open: {0}")]
    Source(E),
}

impl<E> From<AcquireError<E>> for RequestError<E> {
    fn from(value: AcquireError<E>) -> Self {
        RequestError::Source(value.into_inner())
    }
}

/// Errors that can occur while loading [`CacheOptions`](crate::CacheOptions).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The prune policy was not one of the known values.
    #[error("invalid prune policy {0:?}, expected `manual` or `next-tick`")]
    InvalidPrunePolicy(String),
    /// An environment variable was set, but not to valid unicode.
    #[error("environment variable {0} is not valid unicode")]
    EnvError(String),
    /// The configuration source could not be read or parsed.
    #[error("Config Error: {0}")]
    ConfigError(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}
