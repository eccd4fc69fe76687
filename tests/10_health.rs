mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/health")).send().await?;

    // OK with a database, SERVICE_UNAVAILABLE without one
    assert!(
        res.status() == StatusCode::OK || res.status() == StatusCode::SERVICE_UNAVAILABLE,
        "unexpected status: {}",
        res.status()
    );
    let body = res.json::<serde_json::Value>().await?;
    assert!(body["data"]["status"].is_string());
    Ok(())
}

#[tokio::test]
async fn root_lists_endpoints() -> Result<()> {
    let server = common::ensure_server().await?;
    let body = reqwest::get(server.url("/")).await?.json::<serde_json::Value>().await?;

    assert_eq!(body["success"], serde_json::json!(true));
    assert_eq!(body["data"]["name"], serde_json::json!("ESM Portal API"));
    assert!(body["data"]["endpoints"]["admin"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_routes_use_error_envelope() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/no-such-thing")).await?;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(common::error_code(&body), "NOT_FOUND");
    Ok(())
}
