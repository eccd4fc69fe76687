mod common;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

const BOUNDARY: &str = "esm-portal-test-boundary";

/// multipart/form-data body with one `file` part per (name, bytes)
fn multipart(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn token(client: &reqwest::Client, server: &common::TestServer) -> Result<String> {
    let body = json!({"name": "Ram Singh", "email": common::unique_email(), "password": "parade123"});
    let res = client.post(server.url("/auth/register")).json(&body).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    Ok(body["data"]["token"].as_str().context("token missing")?.to_string())
}

#[tokio::test]
async fn uploads_require_a_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::Client::new()
        .post(server.url("/api/uploads"))
        .header("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(multipart(&[("badge.png", vec![1u8; 16])]))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn non_multipart_body_is_bad_request() -> Result<()> {
    let Some(_pool) = common::database().await? else { return Ok(()) };
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = token(&client, server).await?;

    let res = client
        .post(server.url("/api/uploads"))
        .bearer_auth(&token)
        .json(&json!({"file": "badge.png"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(common::error_code(&body), "BAD_REQUEST");
    Ok(())
}

#[tokio::test]
async fn batches_above_the_json_limit_are_accepted() -> Result<()> {
    let Some(_pool) = common::database().await? else { return Ok(()) };
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = token(&client, server).await?;

    // Three 4 MiB scans: under the per-file cap, over the 10 MiB request cap
    let scan = vec![7u8; 4 * 1024 * 1024];
    let files = [
        ("discharge-1.pdf", scan.clone()),
        ("discharge-2.pdf", scan.clone()),
        ("discharge-3.pdf", scan),
    ];
    let res = client
        .post(server.url("/api/uploads"))
        .bearer_auth(&token)
        .header("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(multipart(&files))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["files"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn a_refused_part_fails_the_whole_batch() -> Result<()> {
    let Some(_pool) = common::database().await? else { return Ok(()) };
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = token(&client, server).await?;

    let res = client
        .post(server.url("/api/uploads"))
        .bearer_auth(&token)
        .header("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(multipart(&[("badge.png", vec![1u8; 64]), ("setup.exe", vec![2u8; 64])]))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(common::error_code(&body), "VALIDATION_ERROR");
    Ok(())
}
