// src/error.rs

use thiserror::Error;

/// Core error types for criage
#[derive(Error, Debug)]
pub enum Error {
    /// Package, version, file or config key does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Archive extension or format name is not one of the supported five
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Archive entry resolves outside the extraction root
    #[error("path traversal detected: {0}")]
    PathTraversal(String),

    /// A required dependency could not be installed
    #[error("dependency error: {0}")]
    Dependency(String),

    /// A lifecycle hook or build script exited non-zero
    #[error("hook execution failed: {0}")]
    HookExecution(String),

    /// Repository unreachable or returned a non-success status
    #[error("network error: {0}")]
    Network(String),

    /// Checksum mismatch
    #[error("integrity check failed: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    /// Malformed configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Archive carries no embedded metadata block
    #[error("no metadata found in archive: {0}")]
    MetadataNotFound(String),

    /// Manifest failed validation
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Directory walk errors
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Zip container errors
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// True for errors a caller should report as "does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Result type alias using criage's Error type
pub type Result<T> = std::result::Result<T, Error>;
