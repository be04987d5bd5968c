use crate::error::{GqlwireError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File names searched for, in order, in each directory.
pub const CONFIG_FILE_NAMES: &[&str] = &["gqlwire.toml", "gqlwire.yml", "gqlwire.yaml"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub schema: SchemaSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Route serving both HTTP requests and WebSocket upgrades.
    #[serde(default = "default_path")]
    pub path: String,

    /// How long a new socket may stay silent before `connection_init`.
    /// Zero waits forever.
    #[serde(default = "default_connection_init_timeout_ms")]
    pub connection_init_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    "/graphql".to_string()
}

fn default_connection_init_timeout_ms() -> u64 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            connection_init_timeout_ms: default_connection_init_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connection_init_timeout(&self) -> Option<Duration> {
        match self.connection_init_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSettings {
    /// SDL file to serve. Relative paths resolve against the config file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl GatewayConfig {
    /// Loads the nearest config file at or above `start_path`.
    pub fn load(start_path: &Path) -> Result<(Self, PathBuf)> {
        let config_path = Self::find_config_file(start_path)?;
        let config = Self::from_file(&config_path)?;
        let project_root = config_path
            .parent()
            .ok_or_else(|| GqlwireError::Config("Config file has no parent directory".to_string()))?
            .to_path_buf();
        Ok((config, project_root))
    }

    /// Parses a config file, choosing TOML or YAML by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: GatewayConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml") | Some("yaml") => serde_yaml::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(GqlwireError::Config(format!(
                    "Unsupported config format: {}",
                    path.display()
                )));
            }
        };
        config.validate()?;

        if let (Some(schema_path), Some(dir)) = (&config.schema.path, path.parent()) {
            if schema_path.is_relative() {
                config.schema.path = Some(dir.join(schema_path));
            }
        }
        Ok(config)
    }

    pub fn find_config_file(start_path: &Path) -> Result<PathBuf> {
        let mut current = start_path.to_path_buf();
        loop {
            for name in CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    return Ok(config_path);
                }
            }
            if !current.pop() {
                return Err(GqlwireError::ConfigNotFound);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.server.path.starts_with('/') {
            return Err(GqlwireError::Config(format!(
                "server.path must start with '/', got {:?}",
                self.server.path
            )));
        }
        Ok(())
    }
}
