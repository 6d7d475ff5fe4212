use thiserror::Error;

/// Main error type for the PDCA graph store
#[derive(Error, Debug)]
pub enum GraphError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Edge metadata could not be encoded or decoded
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using GraphError
pub type Result<T> = std::result::Result<T, GraphError>;
