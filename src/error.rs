use thiserror::Error;

/// Main error type for Coldlist
#[derive(Error, Debug)]
pub enum ColdlistError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored JSON columns that fail to (de)serialize
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Binary or text decode failure while loading an uploaded file
    #[error("could not read file: {0}")]
    UnreadableFile(String),

    /// The file has no usable header row
    #[error("no valid headers found")]
    NoHeaders,

    /// List not found
    #[error("List not found: {0}")]
    ListNotFound(String),

    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    /// Nothing from the file could be stored
    #[error("Import failed: {0}")]
    ImportFailed(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using ColdlistError
pub type Result<T> = std::result::Result<T, ColdlistError>;
