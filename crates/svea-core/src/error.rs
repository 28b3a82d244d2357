// crates/svea-core/src/error.rs

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum SveaError {
    #[error("Missing files: {0}")]
    MissingFiles(String),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Dtype error: {0}")]
    Dtype(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Not configured: {0}")]
    Unconfigured(String),

    #[error("File I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{collaborator} failed: {source}")]
    Collaborator {
        collaborator: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

// Constructors log at error level before returning.
impl SveaError {
    pub fn missing_files(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("{message}");
        Self::MissingFiles(message)
    }

    pub fn path(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("{message}");
        Self::Path(message)
    }

    pub fn dtype(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("{message}");
        Self::Dtype(message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("{message}");
        Self::Permission(message)
    }

    pub fn unconfigured(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("{message}");
        Self::Unconfigured(message)
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        error!(path = %path.display(), "file I/O failed: {source}");
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn collaborator(collaborator: &'static str, source: anyhow::Error) -> Self {
        error!("{collaborator} failed: {source:#}");
        Self::Collaborator {
            collaborator,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SveaError>;
