use crate::{InvalidParamsError, Params, Request};
use serde_json::{Number, Value};
use std::{
    borrow::Borrow,
    fmt::{self, Display},
    sync::Arc,
};

/// The canonical, comparable form of a [`Request`].
///
/// Cloning is cheap; the key is reference-counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(Arc<str>);

impl RequestKey {
    /// Returns the key as a string slice.
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RequestKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestKey {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for RequestKey {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&Request> for RequestKey {
    fn from(value: &Request) -> Self {
        value.key()
    }
}

/// Computes the canonical key for a path and an optional params value.
///
/// `params` may be absent, `null`, or an object; anything else is rejected.
/// Numbers compare by value, so `1` and `1.0` give the same key.
pub fn normalize(
    path: &str,
    params: Option<&Value>,
) -> Result<RequestKey, InvalidParamsError> {
    match params {
        None | Some(Value::Null) => Ok(key_for(path, &Params::new())),
        Some(Value::Object(map)) => Ok(key_for(path, map)),
        Some(other) => Err(InvalidParamsError {
            found: value_kind(other),
        }),
    }
}

pub(crate) fn key_for(path: &str, params: &Params) -> RequestKey {
    if params.is_empty() {
        return RequestKey::from(path);
    }
    let mut buf = String::with_capacity(path.len() + 16);
    buf.push_str(path);
    buf.push('?');
    write_object(params, &mut buf);
    RequestKey::from(buf)
}

// object keys are written in sorted order at every level
fn write_canonical(value: &Value, buf: &mut String) {
    match value {
        Value::Object(map) => write_object(map, buf),
        Value::Array(items) => {
            buf.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    buf.push(',');
                }
                write_canonical(item, buf);
            }
            buf.push(']');
        }
        Value::Number(number) => buf.push_str(&number_text(number)),
        scalar => buf.push_str(&scalar.to_string()),
    }
}

// floats beyond this are not guaranteed to be exact integers
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Renders a number so that an integral float reads the same as the integer
/// it equals: `1.0` is written as `1`.
pub(crate) fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(f)
            if number.is_f64()
                && f.fract() == 0.0
                && f.abs() <= MAX_EXACT_INTEGER =>
        {
            (f as i64).to_string()
        }
        _ => number.to_string(),
    }
}

fn write_object(map: &Params, buf: &mut String) {
    let mut entries = map.iter().collect::<Vec<_>>();
    entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

    buf.push('{');
    for (idx, (key, value)) in entries.into_iter().enumerate() {
        if idx > 0 {
            buf.push(',');
        }
        buf.push_str(&Value::String(key.clone()).to_string());
        buf.push(':');
        write_canonical(value, buf);
    }
    buf.push('}');
}

/// Names the kind of a JSON value, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
