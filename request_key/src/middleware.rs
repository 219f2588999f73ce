use crate::{
    key::{number_text, value_kind},
    MiddlewareError, Request,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

// unreserved characters (RFC 3986) stay as they are
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A single, pure rewrite applied to a request before it is keyed.
pub trait Middleware: Send + Sync {
    /// A short name for this stage, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Rewrites the request, or rejects it.
    fn apply(&self, request: Request) -> Result<Request, MiddlewareError>;
}

/// Rejects empty paths and paths containing whitespace, control characters, `?` or `#`.
///
/// Query data belongs in the request parameters, not the path.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidatePath;

impl Middleware for ValidatePath {
    fn name(&self) -> &'static str {
        "validate-path"
    }

    fn apply(&self, request: Request) -> Result<Request, MiddlewareError> {
        let path = request.path();
        if path.is_empty() {
            return Err(MiddlewareError::EmptyPath);
        }
        check_chars(path)?;
        Ok(request)
    }
}

fn check_chars(path: &str) -> Result<(), MiddlewareError> {
    match path.chars().find(|c| {
        c.is_whitespace() || c.is_control() || *c == '?' || *c == '#'
    }) {
        Some(found) => Err(MiddlewareError::InvalidPath {
            path: path.to_string(),
            found,
        }),
        None => Ok(()),
    }
}

/// Places the request path beneath a base path.
///
/// The base is held to the same rules as [`ValidatePath`], so nesting cannot
/// bring back characters validation has already ruled out.
#[derive(Debug, Clone)]
pub struct Nest {
    base: String,
}

impl Nest {
    /// Creates a stage that prefixes every path with `base`.
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// The base path.
    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Middleware for Nest {
    fn name(&self) -> &'static str {
        "nest"
    }

    fn apply(&self, mut request: Request) -> Result<Request, MiddlewareError> {
        check_chars(&self.base)?;
        let base = self.base.trim_end_matches('/');
        let rest = request.path().trim_start_matches('/');
        let path = if rest.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{rest}")
        };
        request.set_path(path);
        Ok(request)
    }
}

/// Fills `:name` path segments from the parameter of the same name.
///
/// Each parameter used this way is removed from the request's parameters, so it does not
/// appear twice in the key. Strings are percent-encoded; numbers and booleans are written
/// as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpandPattern;

impl Middleware for ExpandPattern {
    fn name(&self) -> &'static str {
        "expand-pattern"
    }

    fn apply(&self, mut request: Request) -> Result<Request, MiddlewareError> {
        if !request.path().contains(':') {
            return Ok(request);
        }

        let segments = request
            .path()
            .split('/')
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut expanded = Vec::with_capacity(segments.len());
        for segment in segments {
            let name = match segment.strip_prefix(':') {
                Some(name) if !name.is_empty() => name,
                _ => {
                    expanded.push(segment);
                    continue;
                }
            };
            let value = match request.params_mut().remove(name) {
                Some(Value::String(s)) => {
                    utf8_percent_encode(&s, SEGMENT).to_string()
                }
                Some(Value::Number(n)) => number_text(&n),
                Some(Value::Bool(b)) => b.to_string(),
                Some(other) => {
                    return Err(MiddlewareError::UnsupportedParam {
                        name: name.to_string(),
                        found: value_kind(&other),
                    })
                }
                None => {
                    return Err(MiddlewareError::MissingParam(
                        name.to_string(),
                    ))
                }
            };
            expanded.push(value);
        }
        request.set_path(expanded.join("/"));
        Ok(request)
    }
}

/// Brings a path into standard form: one leading slash, no repeated slashes, and no trailing
/// slash (except for the root path `/`).
#[derive(Debug, Default, Clone, Copy)]
pub struct Standardize;

impl Middleware for Standardize {
    fn name(&self) -> &'static str {
        "standardize"
    }

    fn apply(&self, mut request: Request) -> Result<Request, MiddlewareError> {
        let mut path = String::with_capacity(request.path().len() + 1);
        for segment in request.path().split('/').filter(|s| !s.is_empty()) {
            path.push('/');
            path.push_str(segment);
        }
        if path.is_empty() {
            path.push('/');
        }
        request.set_path(path);
        Ok(request)
    }
}

/// An ordered list of [`Middleware`], applied left to right.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Creates an empty pipeline, which passes requests through unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default pipeline: [`ValidatePath`], then [`ExpandPattern`], then [`Standardize`].
    pub fn standard() -> Self {
        Self::new()
            .with(ValidatePath)
            .with(ExpandPattern)
            .with(Standardize)
    }

    /// Like [`Pipeline::standard`], with a [`Nest`] stage under `base` right after validation.
    pub fn nested(base: impl Into<String>) -> Self {
        Self::new()
            .with(ValidatePath)
            .with(Nest::new(base))
            .with(ExpandPattern)
            .with(Standardize)
    }

    /// Appends a stage.
    pub fn with(mut self, stage: impl Middleware + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// The names of the stages, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs the request through every stage, stopping at the first error.
    pub fn apply(&self, request: Request) -> Result<Request, MiddlewareError> {
        self.stages
            .iter()
            .try_fold(request, |request, stage| stage.apply(request))
    }
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.names())
            .finish()
    }
}
