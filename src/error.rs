use thiserror::Error;

#[derive(Error, Debug)]
pub enum PermissionError {
    // Persistence errors
    #[error("Failed to read permission file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse permission file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to save permissions to '{path}': {source}")]
    Save {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Permission file name '{name}' is not a guild id")]
    InvalidFileName { name: String },

    // Background writer errors
    #[error("Persistence writer has stopped")]
    WriterStopped,

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<serde_json::Error> for PermissionError {
    fn from(err: serde_json::Error) -> Self {
        PermissionError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PermissionError>;
