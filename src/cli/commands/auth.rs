use chrono::{Duration, Utc};
use clap::Subcommand;
use reqwest::Method;
use serde_json::{json, Value};

use crate::cli::config::{current_server, load_auth_config, save_auth_config, TokenInfo};
use crate::cli::utils::{api_request, output_success, output_value};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the current server")]
    Login {
        #[arg(help = "Account email")]
        email: String,
        #[arg(long, env = "ESM_PASSWORD", hide_env_values = true, help = "Password")]
        password: String,
    },

    #[command(about = "Show current user information")]
    Whoami,

    #[command(about = "Forget the saved token for the current server")]
    Logout,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let (name, _) = current_server()?;
            let session = api_request(
                Method::POST,
                "/auth/login",
                Some(json!({ "email": email, "password": password })),
                false,
            )
            .await?;
            let token = session_token(&session)?;

            let mut auth = load_auth_config()?;
            let role = token.role.clone();
            auth.tokens.insert(name.clone(), token);
            save_auth_config(&auth)?;
            output_success(
                &output_format,
                &format!("Logged in to '{}' as {} ({})", name, email, role),
                Some(json!({ "server": name, "email": email, "role": role })),
            )
        }
        AuthCommands::Whoami => {
            let user = api_request(Method::GET, "/api/auth/whoami", None, true).await?;
            output_value(&output_format, &user)
        }
        AuthCommands::Logout => {
            let (name, _) = current_server()?;
            let mut auth = load_auth_config()?;
            if auth.tokens.remove(&name).is_none() {
                return output_success(&output_format, &format!("Not logged in to '{}'", name), None);
            }
            save_auth_config(&auth)?;
            output_success(&output_format, &format!("Logged out of '{}'", name), None)
        }
    }
}

/// Pull the token out of an `AuthSession` payload
fn session_token(session: &Value) -> anyhow::Result<TokenInfo> {
    let token = session
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("Login response did not include a token"))?;
    let expires_in = session.get("expires_in").and_then(Value::as_i64).unwrap_or(0);
    let user = session.get("user").cloned().unwrap_or(Value::Null);
    Ok(TokenInfo {
        token: token.to_string(),
        email: user.get("email").and_then(Value::as_str).unwrap_or_default().to_string(),
        role: user.get("role").and_then(Value::as_str).unwrap_or("buyer").to_string(),
        expires_at: Utc::now() + Duration::seconds(expires_in),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_read_from_session() {
        let session = json!({
            "token": "abc.def.ghi",
            "expires_in": 3600,
            "user": {"email": "admin@esmportal.in", "role": "admin"}
        });
        let token = session_token(&session).unwrap();
        assert_eq!(token.token, "abc.def.ghi");
        assert_eq!(token.role, "admin");
        assert!(!token.is_expired());

        assert!(session_token(&json!({"user": {}})).is_err());
    }
}
