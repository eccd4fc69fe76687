use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{
    load_auth_config, load_environment_config, load_server_config, ping_server, save_auth_config,
    save_environment_config, save_server_config, ServerInfo, ServerStatus,
};
use crate::cli::utils::{output_empty_collection, output_success, output_value};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Register remote server")]
    Add {
        #[arg(help = "Server URL, e.g. http://localhost:3000")]
        url: String,
        #[arg(help = "Server name (defaults to the hostname)")]
        name: Option<String>,
        #[arg(long, default_value = "", help = "Free-form description")]
        description: String,
    },

    #[command(about = "List all servers with health status")]
    List,

    #[command(about = "Switch to server (persistent selection) or show current server")]
    Use {
        #[arg(help = "Server name to switch to")]
        name: Option<String>,
    },

    #[command(about = "Remove server from registry")]
    Delete {
        #[arg(help = "Server name to delete")]
        name: String,
    },

    #[command(about = "Check server health status from API /health endpoint")]
    Health {
        #[arg(help = "Server name (defaults to current server)")]
        name: Option<String>,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Add { url, name, description } => {
            let info = ServerInfo::from_url(&url, description)?;
            let name = name.unwrap_or_else(|| info.hostname.clone());
            let mut config = load_server_config()?;
            if config.servers.contains_key(&name) {
                anyhow::bail!("Server '{}' already exists", name);
            }
            let server_url = info.url();
            config.servers.insert(name.clone(), info);
            save_server_config(&config)?;

            // The first server registered becomes current
            let mut env = load_environment_config()?;
            if env.current_server.is_none() {
                env.current_server = Some(name.clone());
                save_environment_config(&env)?;
            }
            output_success(
                &output_format,
                &format!("Server '{}' added ({})", name, server_url),
                Some(json!({ "name": name, "url": server_url })),
            )
        }
        ServerCommands::List => {
            let mut config = load_server_config()?;
            if config.servers.is_empty() {
                return output_empty_collection(&output_format, "servers", "No servers registered");
            }
            let current = load_environment_config()?.current_server;

            let mut names: Vec<String> = config.servers.keys().cloned().collect();
            names.sort();
            let mut rows = Vec::new();
            for name in &names {
                if let Some(info) = config.servers.get_mut(name) {
                    let status = ping_server(info).await;
                    info.update_ping(status);
                    rows.push(json!({
                        "name": name,
                        "url": info.url(),
                        "status": info.status,
                        "current": current.as_deref() == Some(name.as_str()),
                        "description": info.description,
                    }));
                }
            }
            save_server_config(&config)?;

            match output_format {
                OutputFormat::Json => output_value(&output_format, &json!({ "servers": rows })),
                OutputFormat::Text => {
                    for row in &rows {
                        let marker = if row["current"] == json!(true) { "*" } else { " " };
                        println!(
                            "{} {:<16} {:<32} {}",
                            marker,
                            row["name"].as_str().unwrap_or_default(),
                            row["url"].as_str().unwrap_or_default(),
                            row["status"].as_str().unwrap_or_default()
                        );
                    }
                    Ok(())
                }
            }
        }
        ServerCommands::Use { name } => {
            let mut env = load_environment_config()?;
            match name {
                Some(name) => {
                    if !load_server_config()?.servers.contains_key(&name) {
                        anyhow::bail!("Server '{}' not found", name);
                    }
                    env.current_server = Some(name.clone());
                    save_environment_config(&env)?;
                    output_success(
                        &output_format,
                        &format!("Switched to server '{}'", name),
                        Some(json!({ "current_server": name })),
                    )
                }
                None => match env.current_server {
                    Some(current) => output_value(&output_format, &json!({ "current_server": current })),
                    None => output_success(&output_format, "No current server set", None),
                },
            }
        }
        ServerCommands::Delete { name } => {
            let mut config = load_server_config()?;
            if config.servers.remove(&name).is_none() {
                anyhow::bail!("Server '{}' not found", name);
            }
            save_server_config(&config)?;

            let mut auth = load_auth_config()?;
            if auth.tokens.remove(&name).is_some() {
                save_auth_config(&auth)?;
            }
            let mut env = load_environment_config()?;
            if env.current_server.as_deref() == Some(name.as_str()) {
                env.current_server = None;
                save_environment_config(&env)?;
            }
            output_success(&output_format, &format!("Server '{}' deleted", name), None)
        }
        ServerCommands::Health { name } => {
            let name = match name {
                Some(name) => name,
                None => load_environment_config()?
                    .current_server
                    .ok_or_else(|| anyhow::anyhow!("No server selected"))?,
            };
            let mut config = load_server_config()?;
            let info = config
                .servers
                .get_mut(&name)
                .ok_or_else(|| anyhow::anyhow!("Server '{}' not found", name))?;
            let status = ping_server(info).await;
            info.update_ping(status);
            let url = info.url();
            save_server_config(&config)?;

            if status != ServerStatus::Up {
                anyhow::bail!("Server '{}' at {} is down", name, url);
            }
            output_success(
                &output_format,
                &format!("Server '{}' is up", name),
                Some(json!({ "name": name, "url": url, "status": status })),
            )
        }
    }
}
