use reqwest::Method;
use serde_json::{json, Value};

use crate::cli::config::{current_server, load_auth_config};
use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Print an API payload; text mode shows one `key: value` line per scalar field
pub fn output_value(output_format: &OutputFormat, value: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => match value {
            Value::Object(map) => {
                for (key, field) in map {
                    match field {
                        Value::Object(_) | Value::Array(_) => {}
                        Value::String(s) => println!("{}: {}", key, s),
                        other => println!("{}: {}", key, other),
                    }
                }
            }
            other => println!("{}", other),
        },
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Error text from the API envelope, falling back to the HTTP status
pub fn api_error_message(status: reqwest::StatusCode, body: &Value) -> String {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));
    match body.get("field_errors").and_then(Value::as_object) {
        Some(fields) if !fields.is_empty() => {
            let details: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.as_str().unwrap_or_default()))
                .collect();
            format!("{} ({}) [{}]", message, status.as_u16(), details.join("; "))
        }
        _ => format!("{} ({})", message, status.as_u16()),
    }
}

/// Call the current server and unwrap the `data` of the success envelope.
/// `authenticated` attaches the saved token for that server.
pub async fn api_request(method: Method, path: &str, body: Option<Value>, authenticated: bool) -> anyhow::Result<Value> {
    let (name, server) = current_server()?;
    let client = reqwest::Client::new();
    let mut request = client
        .request(method, format!("{}{}", server.url(), path))
        .timeout(std::time::Duration::from_secs(30));

    if authenticated {
        let auth = load_auth_config()?;
        let token = auth
            .tokens
            .get(&name)
            .ok_or_else(|| anyhow::anyhow!("Not logged in to '{}'. Run 'esm auth login <email>'", name))?;
        if token.is_expired() {
            anyhow::bail!("Session for '{}' has expired. Run 'esm auth login' again", name);
        }
        request = request.bearer_auth(&token.token);
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    let payload: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        anyhow::bail!(api_error_message(status, &payload));
    }
    Ok(payload.get("data").cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_include_field_details() {
        let body = json!({
            "success": false,
            "message": "Validation failed",
            "field_errors": {"email": "Invalid email"}
        });
        let message = api_error_message(reqwest::StatusCode::BAD_REQUEST, &body);
        assert_eq!(message, "Validation failed (400) [email: Invalid email]");
    }

    #[test]
    fn missing_message_uses_status() {
        let message = api_error_message(reqwest::StatusCode::NOT_FOUND, &Value::Null);
        assert_eq!(message, "Not Found (404)");
    }
}
