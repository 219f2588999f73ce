use crate::{
    key::{key_for, value_kind},
    InvalidParamsError, RequestKey,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The parameters of a request.
pub type Params = serde_json::Map<String, Value>;

/// A path plus a mapping of parameters, identifying a desired data stream.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    path: String,
    #[serde(default)]
    params: Params,
}

impl Request {
    /// Creates a request with no parameters.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Params::new(),
        }
    }

    /// Creates a request from a path and an existing parameter mapping.
    pub fn with_params(path: impl Into<String>, params: Params) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }

    /// Creates a request from a path and an untyped params value.
    ///
    /// `null` is treated as "no parameters". Any value other than `null` or an object fails
    /// with [`InvalidParamsError`].
    pub fn from_value(
        path: impl Into<String>,
        params: Value,
    ) -> Result<Self, InvalidParamsError> {
        let params = match params {
            Value::Null => Params::new(),
            Value::Object(map) => map,
            other => {
                return Err(InvalidParamsError {
                    found: value_kind(&other),
                })
            }
        };
        Ok(Self::with_params(path, params))
    }

    /// Adds (or replaces) a single parameter.
    pub fn param(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// The request path.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replaces the request path.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// The request parameters.
    #[inline(always)]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Mutable access to the request parameters.
    #[inline(always)]
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Splits the request into its path and parameters.
    pub fn into_parts(self) -> (String, Params) {
        (self.path, self.params)
    }

    /// Computes the canonical key of this request.
    pub fn key(&self) -> RequestKey {
        key_for(&self.path, &self.params)
    }
}

impl From<&str> for Request {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Request {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
