use media_library::session::{HttpSessionResolver, Session, SessionResolver};

const SIGNED_IN_BODY: &str = r#"{
    "clientPrincipal": {
        "userId": "u1",
        "userDetails": "ada",
        "identityProvider": "github",
        "userRoles": ["anonymous", "authenticated"]
    }
}"#;

#[tokio::test]
async fn test_authenticated_principal_resolves() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/.auth/me")
        .match_header("cookie", "StaticWebAppsAuthCookie=abc")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(SIGNED_IN_BODY)
        .create_async()
        .await;

    let resolver = HttpSessionResolver::new(&format!("{}/.auth/me", server.url())).unwrap();
    let session = resolver
        .resolve(Some("StaticWebAppsAuthCookie=abc"))
        .await;

    mock.assert_async().await;
    let identity = session.identity().expect("should be authenticated");
    assert_eq!(identity.user_id, "u1");
    assert_eq!(identity.user_details, "ada");
    assert_eq!(identity.identity_provider, "github");
}

#[tokio::test]
async fn test_null_principal_is_anonymous() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/.auth/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"clientPrincipal": null}"#)
        .create_async()
        .await;

    let resolver = HttpSessionResolver::new(&format!("{}/.auth/me", server.url())).unwrap();
    assert_eq!(resolver.resolve(None).await, Session::Anonymous);
}

#[tokio::test]
async fn test_missing_authenticated_role_is_anonymous() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/.auth/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"clientPrincipal": {"userId": "u1", "userDetails": "ada",
                "identityProvider": "github", "userRoles": ["anonymous"]}}"#,
        )
        .create_async()
        .await;

    let resolver = HttpSessionResolver::new(&format!("{}/.auth/me", server.url())).unwrap();
    assert_eq!(resolver.resolve(None).await, Session::Anonymous);
}

#[tokio::test]
async fn test_error_status_is_anonymous() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/.auth/me")
        .with_status(500)
        .create_async()
        .await;

    let resolver = HttpSessionResolver::new(&format!("{}/.auth/me", server.url())).unwrap();
    assert_eq!(resolver.resolve(Some("a=b")).await, Session::Anonymous);
}

#[tokio::test]
async fn test_malformed_body_is_anonymous() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/.auth/me")
        .with_status(200)
        .with_body("<html>login</html>")
        .create_async()
        .await;

    let resolver = HttpSessionResolver::new(&format!("{}/.auth/me", server.url())).unwrap();
    assert_eq!(resolver.resolve(None).await, Session::Anonymous);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_anonymous() {
    // Nothing listens on the discard port
    let resolver = HttpSessionResolver::new("http://127.0.0.1:9/.auth/me").unwrap();
    assert_eq!(resolver.resolve(None).await, Session::Anonymous);
}
