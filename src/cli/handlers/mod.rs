mod check;
mod serve;
mod types;
mod utils;

pub use check::handle_check;
pub use serve::handle_serve;
pub use types::handle_types;

use crate::config::GatewayConfig;
use crate::error::GqlwireError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Common context passed to all command handlers
pub struct CommandContext {
    pub config: GatewayConfig,
    /// Directory of the loaded config file, if one was found.
    pub root: Option<PathBuf>,
}

impl CommandContext {
    /// Uses `config_path` when given, otherwise the nearest config file
    /// above the working directory, otherwise the defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            let config = GatewayConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            let root = path.parent().map(Path::to_path_buf);
            return Ok(Self { config, root });
        }

        let cwd = std::env::current_dir()?;
        match GatewayConfig::load(&cwd) {
            Ok((config, root)) => Ok(Self {
                config,
                root: Some(root),
            }),
            Err(GqlwireError::ConfigNotFound) => Ok(Self {
                config: GatewayConfig::default(),
                root: None,
            }),
            Err(e) => Err(e).context("Failed to load gqlwire configuration"),
        }
    }
}
