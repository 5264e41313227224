//! HTTP resolver behavior against a local mock server.
#![cfg(feature = "resolve-http")]
use serde_json::json;

#[test]
fn test_fetches_remote_documents() {
    let mut server = mockito::Server::new();
    let root = server
        .mock("GET", "/schemas/root.json")
        .with_header("content-type", "application/json")
        .with_body(r#"{"person": {"$ref": "person.json"}}"#)
        .create();
    let person = server
        .mock("GET", "/schemas/person.json")
        .with_header("content-type", "application/json")
        .with_body(r#"{"type": "object"}"#)
        .create();

    let location = format!("{}/schemas/root.json", server.url());
    let dereferenced = refbundle::dereference(&location).expect("Should dereference");
    assert_eq!(
        dereferenced.to_value().expect("Acyclic"),
        json!({"person": {"type": "object"}})
    );
    root.assert();
    person.assert();
}

#[test]
fn test_redirects_are_followed_within_the_limit() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/a.json")
        .with_status(302)
        .with_header("location", "/b.json")
        .create();
    server
        .mock("GET", "/b.json")
        .with_body(r#"{"type": "string"}"#)
        .create();

    let location = format!("{}/a.json", server.url());
    let value = refbundle::options()
        .redirects(2)
        .parse(&location)
        .expect("Should parse");
    assert_eq!(value, json!({"type": "string"}));
}

#[test]
fn test_redirect_overflow_reports_the_chain() {
    let mut server = mockito::Server::new();
    for (from, to) in [("a", "b"), ("b", "c"), ("c", "d")] {
        server
            .mock("GET", format!("/{from}.json").as_str())
            .with_status(302)
            .with_header("location", format!("/{to}.json").as_str())
            .create();
    }

    let location = format!("{}/a.json", server.url());
    let error = refbundle::options()
        .redirects(2)
        .parse(&location)
        .expect_err("Should fail");
    assert!(matches!(error, refbundle::Error::Resolver { .. }));
    let message = error.to_string();
    for name in ["a.json", "b.json", "c.json", "d.json"] {
        assert!(message.contains(name), "{message}");
    }
}

#[test]
fn test_error_status_fails() {
    let mut server = mockito::Server::new();
    server.mock("GET", "/missing.json").with_status(404).create();

    let location = format!("{}/missing.json", server.url());
    let error = refbundle::parse(&location).expect_err("Should fail");
    assert!(matches!(error, refbundle::Error::Resolver { .. }));
    assert!(error.to_string().contains("404"), "{error}");
}

#[test]
fn test_redirect_without_location_fails() {
    let mut server = mockito::Server::new();
    server.mock("GET", "/loop.json").with_status(301).create();

    let location = format!("{}/loop.json", server.url());
    let error = refbundle::parse(&location).expect_err("Should fail");
    assert!(matches!(error, refbundle::Error::Resolver { .. }));
    assert!(error.to_string().contains("Location"), "{error}");
}

#[test]
fn test_configured_headers_are_sent() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/private.json")
        .match_header("x-api-key", "secret")
        .with_body(r#"{"type": "object"}"#)
        .create();

    let location = format!("{}/private.json", server.url());
    let value = refbundle::options()
        .header("x-api-key", "secret")
        .parse(&location)
        .expect("Should parse");
    assert_eq!(value, json!({"type": "object"}));
    mock.assert();
}

#[test]
fn test_custom_resolver_takes_precedence_by_order() {
    use std::sync::Arc;

    struct CannedResolver;

    impl refbundle::Resolve for CannedResolver {
        fn order(&self) -> i32 {
            1
        }
        fn can_read(&self, file: &refbundle::FileInfo) -> bool {
            file.url().scheme() == "http"
        }
        fn read(&self, _: &refbundle::FileInfo) -> Result<Vec<u8>, refbundle::BoxError> {
            Ok(br#"{"canned": true}"#.to_vec())
        }
    }

    // No server is listening on this address; the canned resolver runs
    // first and the HTTP resolver is never consulted.
    let value = refbundle::options()
        .resolver(Arc::new(CannedResolver))
        .parse("http://127.0.0.1:9/unreachable.json")
        .expect("Should parse");
    assert_eq!(value, json!({"canned": true}));
}
