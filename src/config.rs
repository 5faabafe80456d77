use crate::error::{AppError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadsConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Base address used to build public file URLs
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3333,
            public_url: "http://localhost:3333".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for the in-memory store
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/meetapp.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub dir: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("tmp/uploads"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { token_ttl_hours: 24 * 7 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    /// HTTP relay endpoint; mail is only logged when unset
    pub relay_url: Option<String>,
    /// Deadline for delivering one message
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "Equipe Meetapp <noreply@meetapp.com>".to_string(),
            relay_url: None,
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `config.toml`), then apply
    /// environment overrides. A missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                info!("{} not found, using defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(port) = var("MEETAPP_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid MEETAPP_PORT value: {e}")))?;
        }
        if let Some(url) = var("MEETAPP_PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Some(path) = var("MEETAPP_DATABASE") {
            self.database.path = path;
        }
        if let Some(dir) = var("MEETAPP_UPLOADS_DIR") {
            self.uploads.dir = PathBuf::from(dir);
        }
        if let Some(url) = var("MEETAPP_MAIL_RELAY_URL") {
            self.mail.relay_url = Some(url);
        }
        Ok(())
    }

    pub fn uses_in_memory_database(&self) -> bool {
        self.database.path == IN_MEMORY_DATABASE
    }
}

fn var(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) => {
            warn!("Environment variable {key} is empty, ignoring");
            None
        }
        Err(_) => None,
    }
}
