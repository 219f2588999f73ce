use crate::{
    normalize, ExpandPattern, InvalidParamsError, Middleware, MiddlewareError,
    Nest, Params, Request, Standardize, ValidatePath,
};
use serde_json::{json, Value};

#[test]
fn key_is_path_when_params_are_empty() {
    assert_eq!(Request::new("/a").key().as_str(), "/a");
    assert_eq!(normalize("/a", None).unwrap().as_str(), "/a");
    assert_eq!(normalize("/a", Some(&Value::Null)).unwrap().as_str(), "/a");
    assert_eq!(normalize("/a", Some(&json!({}))).unwrap().as_str(), "/a");
}

#[test]
fn key_ignores_insertion_order() {
    let mut forward = Params::new();
    forward.insert("a".into(), json!(1));
    forward.insert("b".into(), json!({ "y": true, "x": [1, 2] }));

    let mut backward = Params::new();
    backward.insert("b".into(), json!({ "x": [1, 2], "y": true }));
    backward.insert("a".into(), json!(1));

    let forward = Request::with_params("/q", forward).key();
    let backward = Request::with_params("/q", backward).key();
    assert_eq!(forward, backward);
    assert_eq!(forward.as_str(), r#"/q?{"a":1,"b":{"x":[1,2],"y":true}}"#);
}

#[test]
fn key_is_stable_across_calls() {
    let request = Request::new("/a").param("x", 1).param("s", "two words");
    assert_eq!(request.key(), request.key());
    assert_eq!(request.key(), request.clone().key());
}

#[test]
fn keys_differ_by_value_and_path() {
    let one = Request::new("/a").param("x", 1).key();
    assert_ne!(one, Request::new("/a").param("x", 2).key());
    assert_ne!(one, Request::new("/a").param("x", "1").key());
    assert_ne!(one, Request::new("/b").param("x", 1).key());
}

#[test]
fn integral_floats_key_like_integers() {
    let int = Request::new("/a").param("x", 1).key();
    assert_eq!(int, Request::new("/a").param("x", 1.0).key());
    assert_eq!(
        Request::new("/a").param("x", json!({ "y": [2.0, -0.0] })).key(),
        Request::new("/a").param("x", json!({ "y": [2, 0] })).key()
    );
    assert_eq!(
        Request::new("/a").param("x", 1.5).key().as_str(),
        r#"/a?{"x":1.5}"#
    );
    assert_ne!(int, Request::new("/a").param("x", 1.5).key());
}

#[test]
fn strings_are_escaped_in_keys() {
    let key = Request::new("/a").param("q", "say \"hi\"").key();
    assert_eq!(key.as_str(), r#"/a?{"q":"say \"hi\""}"#);
}

#[test]
fn non_mapping_params_are_rejected() {
    assert_eq!(
        Request::from_value("/a", json!("GET")).unwrap_err(),
        InvalidParamsError { found: "string" }
    );
    assert_eq!(
        normalize("/a", Some(&json!([1]))).unwrap_err(),
        InvalidParamsError { found: "array" }
    );
    assert_eq!(
        normalize("/a", Some(&json!(3))).unwrap_err(),
        InvalidParamsError { found: "number" }
    );
    assert!(Request::from_value("/a", json!(false)).is_err());
}

#[test]
fn validate_path_rejects_bad_paths() {
    assert_eq!(
        ValidatePath.apply(Request::new("")).unwrap_err(),
        MiddlewareError::EmptyPath
    );
    assert!(matches!(
        ValidatePath.apply(Request::new("/a b")),
        Err(MiddlewareError::InvalidPath { found: ' ', .. })
    ));
    assert!(matches!(
        ValidatePath.apply(Request::new("/a?x=1")),
        Err(MiddlewareError::InvalidPath { found: '?', .. })
    ));
    assert!(ValidatePath.apply(Request::new("/users/:id")).is_ok());
}

#[test]
fn nest_joins_base_and_path() {
    let nest = Nest::new("/api/");
    assert_eq!(nest.apply(Request::new("/users")).unwrap().path(), "/api/users");
    assert_eq!(nest.apply(Request::new("users")).unwrap().path(), "/api/users");
    assert_eq!(nest.apply(Request::new("/")).unwrap().path(), "/api");
}

#[test]
fn nest_rejects_invalid_base() {
    assert_eq!(
        Nest::new("/x?a").apply(Request::new("/users")).unwrap_err(),
        MiddlewareError::InvalidPath {
            path: "/x?a".into(),
            found: '?'
        }
    );
}

#[test]
fn expand_pattern_consumes_params() {
    let request = Request::new("/users/:id/posts/:slug")
        .param("id", 42)
        .param("slug", "hello world")
        .param("page", 2);
    let request = ExpandPattern.apply(request).unwrap();
    assert_eq!(request.path(), "/users/42/posts/hello%20world");
    assert_eq!(request.params().len(), 1);
    assert_eq!(request.params()["page"], json!(2));
}

#[test]
fn expand_pattern_writes_integral_floats_as_integers() {
    let request = ExpandPattern
        .apply(Request::new("/users/:id").param("id", 7.0))
        .unwrap();
    assert_eq!(request.path(), "/users/7");
}

#[test]
fn expand_pattern_reports_missing_and_unsupported_params() {
    assert_eq!(
        ExpandPattern
            .apply(Request::new("/users/:id"))
            .unwrap_err(),
        MiddlewareError::MissingParam("id".into())
    );
    assert_eq!(
        ExpandPattern
            .apply(Request::new("/users/:id").param("id", json!([1])))
            .unwrap_err(),
        MiddlewareError::UnsupportedParam {
            name: "id".into(),
            found: "array"
        }
    );
}

#[test]
fn standardize_cleans_slashes() {
    let path = |p: &str| Standardize.apply(Request::new(p)).unwrap().path().to_string();
    assert_eq!(path("a//b/"), "/a/b");
    assert_eq!(path("/a/b"), "/a/b");
    assert_eq!(path("///"), "/");
    assert_eq!(path(""), "/");
}
