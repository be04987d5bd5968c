use thiserror::Error;

use crate::schema::Diagnostic;

#[derive(Error, Debug)]
pub enum GqlwireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schema is invalid ({} diagnostics)", .0.len())]
    InvalidSchema(Vec<Diagnostic>),

    /// A pipeline invariant was violated; this is a defect, not a user error.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("No configuration file found. Pass --config or create gqlwire.toml")]
    ConfigNotFound,
}

pub type Result<T> = std::result::Result<T, GqlwireError>;
