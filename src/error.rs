use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PursuitError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid level layout: {0}")]
    InvalidLayout(String),

    #[error("text generation failed: {0}")]
    TextGeneration(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PursuitError>;
