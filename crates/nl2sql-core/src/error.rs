//! Error types for nl2sql.

use thiserror::Error;

/// Main error type for nl2sql operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Text generation failed
    #[error("generation error: {0}")]
    Generation(#[from] GenerateError),

    /// Schema index operation failed
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Database access failed
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// Sample query source failed
    #[error("sample source error: {0}")]
    Samples(#[from] SampleError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Text generation errors.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no model bound to role {0}")]
    NoModel(String),
}

/// Schema index errors.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index initialization failed: {0}")]
    Init(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("delete failed: {0}")]
    Delete(String),
}

/// Database errors, shared by schema extraction, validation and execution.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid statement: {0}")]
    Syntax(String),

    #[error("statement rejected: {0}")]
    Rejected(String),

    #[error("query failed: {0}")]
    Query(String),
}

/// Sample query source errors.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Result type alias for nl2sql operations.
pub type Result<T> = std::result::Result<T, Error>;
