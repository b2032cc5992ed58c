use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("not configured: missing {}", .0.display())]
    NotConfigured(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "database artifact is locked: {}: stop any process holding it open (e.g. the dev server) and retry",
        .path.display()
    )]
    ArtifactLocked { path: PathBuf },

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("operation '{id}' failed")]
    OperationFailed {
        id: String,
        #[source]
        source: Box<PrepError>,
    },

    #[error("command not found on PATH: {0}")]
    CommandNotFound(String),

    #[error("command `{command}` failed: {status}")]
    CommandFailed { command: String, status: String },

    #[error("state cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PrepError>;
