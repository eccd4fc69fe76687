mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    for path in ["/api/auth/whoami", "/api/orders", "/api/conversations/unread", "/api/bookings/mine"] {
        let res = client.get(server.url(path)).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", path);
        let body = res.json::<Value>().await?;
        assert_eq!(common::error_code(&body), "UNAUTHORIZED");
    }
    Ok(())
}

#[tokio::test]
async fn admin_routes_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/admin/stats")).await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn garbage_tokens_are_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url("/api/auth/whoami"))
        .bearer_auth("not.a.jwt")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/api/auth/whoami"))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn malformed_register_body_is_bad_request() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/auth/register"))
        .header("Content-Type", "application/json")
        .body("{\"name\": ")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(common::error_code(&body), "BAD_REQUEST");

    let res = client
        .post(server.url("/auth/login"))
        .body("email=a@b.in")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
