use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const SERVER_FILE: &str = "server.json";
const ENV_FILE: &str = "env.json";
const AUTH_FILE: &str = "auth.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub hostname: String,
    pub port: u16,
    pub protocol: String,
    pub description: String,
    pub added_at: DateTime<Utc>,
    pub last_ping: Option<DateTime<Utc>>,
    pub status: ServerStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub servers: HashMap<String, ServerInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub current_server: Option<String>,
}

/// Saved session for one server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token: String,
    pub email: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub tokens: HashMap<String, TokenInfo>,
}

impl ServerInfo {
    pub fn new(hostname: String, port: u16, protocol: String, description: String) -> Self {
        Self {
            hostname,
            port,
            protocol,
            description,
            added_at: Utc::now(),
            last_ping: None,
            status: ServerStatus::Unknown,
        }
    }

    /// `http://host:port`, `https://host` or a bare `host[:port]`
    pub fn from_url(raw: &str, description: String) -> anyhow::Result<Self> {
        let with_scheme = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };
        let url = url::Url::parse(&with_scheme).with_context(|| format!("Invalid server URL '{}'", raw))?;
        let hostname = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("Server URL '{}' has no host", raw))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("Server URL '{}' has no port", raw))?;
        Ok(Self::new(hostname, port, url.scheme().to_string(), description))
    }

    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.hostname, self.port)
    }

    pub fn update_ping(&mut self, status: ServerStatus) {
        self.last_ping = Some(Utc::now());
        self.status = status;
    }
}

impl TokenInfo {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("ESM_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("esm").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

fn load_from<T: DeserializeOwned + Default>(dir: &Path, file: &str) -> anyhow::Result<T> {
    let path = dir.join(file);
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content).with_context(|| format!("Corrupt config file {}", path.display()))
}

fn save_to<T: Serialize>(dir: &Path, file: &str, value: &T) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(dir.join(file), content)?;
    Ok(())
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    load_from(&get_config_dir()?, SERVER_FILE)
}

pub fn save_server_config(config: &ServerConfig) -> anyhow::Result<()> {
    save_to(&get_config_dir()?, SERVER_FILE, config)
}

pub fn load_environment_config() -> anyhow::Result<EnvironmentConfig> {
    load_from(&get_config_dir()?, ENV_FILE)
}

pub fn save_environment_config(config: &EnvironmentConfig) -> anyhow::Result<()> {
    save_to(&get_config_dir()?, ENV_FILE, config)
}

pub fn load_auth_config() -> anyhow::Result<AuthConfig> {
    load_from(&get_config_dir()?, AUTH_FILE)
}

pub fn save_auth_config(config: &AuthConfig) -> anyhow::Result<()> {
    save_to(&get_config_dir()?, AUTH_FILE, config)
}

/// Name and details of the selected server
pub fn current_server() -> anyhow::Result<(String, ServerInfo)> {
    let env = load_environment_config()?;
    let name = env
        .current_server
        .ok_or_else(|| anyhow::anyhow!("No server selected. Run 'esm server add <url>' then 'esm server use <name>'"))?;
    let servers = load_server_config()?;
    let info = servers
        .servers
        .get(&name)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Current server '{}' is no longer registered", name))?;
    Ok((name, info))
}

pub async fn ping_server(server_info: &ServerInfo) -> ServerStatus {
    let client = reqwest::Client::new();
    let url = format!("{}/health", server_info.url());

    match client.get(&url).timeout(std::time::Duration::from_secs(5)).send().await {
        Ok(response) if response.status().is_success() => ServerStatus::Up,
        _ => ServerStatus::Down,
    }
}
