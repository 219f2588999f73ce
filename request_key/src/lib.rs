//! Requests and their canonical keys.
//!
//! A [`Request`] names a data stream by a path and a mapping of parameters. Two requests
//! describe the same stream when their [`RequestKey`]s are equal, regardless of the order in
//! which their parameters were inserted:
//!
//! ```rust
//! use request_key::Request;
//! use serde_json::json;
//!
//! let a = Request::from_value("/users", json!({ "page": 2, "sort": "name" }))
//!     .unwrap();
//! let b = Request::new("/users").param("sort", "name").param("page", 2);
//!
//! assert_eq!(a.key(), b.key());
//! assert_eq!(a.key().as_str(), r#"/users?{"page":2,"sort":"name"}"#);
//! ```
//!
//! Before a request is keyed, it can be run through a [`Pipeline`] of
//! [`Middleware`] that validates and rewrites it:
//!
//! ```rust
//! use request_key::{Pipeline, Request};
//!
//! let request = Request::new("/users/:id/").param("id", 7).param("tab", "posts");
//! let request = Pipeline::nested("/api").apply(request).unwrap();
//!
//! assert_eq!(request.path(), "/api/users/7");
//! assert_eq!(request.key().as_str(), r#"/api/users/7?{"tab":"posts"}"#);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
mod key;
mod middleware;
mod request;

pub use errors::*;
pub use key::*;
pub use middleware::*;
pub use request::*;

#[cfg(test)]
mod tests;
