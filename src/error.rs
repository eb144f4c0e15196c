use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("API key must be provided or set as FIRECRAWL_API_KEY environment variable")]
    MissingCredential,

    #[error("Metadata file not found at {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("Error decoding JSON from metadata file {}: {message}", .path.display())]
    CorruptStore { path: PathBuf, message: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to encode JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
