//! Error types for the cache uploader
//!
//! All modules use `UploadResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for uploader operations
pub type UploadResult<T> = Result<T, UploadError>;

/// All errors that can occur while uploading a cache tree
#[derive(Error, Debug)]
pub enum UploadError {
    // Configuration errors
    #[error("Not a directory: {0}")]
    CacheDirNotFound(PathBuf),

    #[error("Cache directory path should end with Cache: {0}")]
    CacheDirMisnamed(PathBuf),

    #[error("Expected {0} environment variable")]
    MissingCredential(&'static str),

    // Remote store errors
    #[error("Simple request failed, check your credentials: {0}")]
    CredentialCheck(String),

    #[error("GitHub rate limit is 0, have to wait some time")]
    RateLimitExhausted,

    #[error("HTTP request failed: {context}: {source}")]
    Http {
        context: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Unexpected response for {context}: {reason}")]
    Response { context: String, reason: String },

    // Cache layout errors
    #[error("File not exists: {0}")]
    MarkerMissing(PathBuf),

    #[error("Cache layout violation at {path}: {reason}")]
    SchemaViolation { path: PathBuf, reason: String },

    #[error("No files found in directory: {0}")]
    NoFilesInDir(PathBuf),

    #[error("Expected no files in directory: {0}")]
    UnexpectedFiles(PathBuf),

    #[error("Non-UTF-8 path in cache tree: {0}")]
    NonUtf8Path(PathBuf),

    // Verification errors
    #[error("Hash mismatch for {remote_path}: expected {expected}, downloaded {downloaded}")]
    HashMismatch {
        remote_path: String,
        expected: String,
        downloaded: String,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an HTTP error with context
    pub fn http(context: impl Into<String>, source: ureq::Error) -> Self {
        Self::Http {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether a retry can reasonably succeed.
    ///
    /// Transport and IO failures are transient; everything else (layout
    /// violations, hash mismatches, bad configuration) is structural and
    /// aborts the run immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. } | Self::Io { .. } | Self::Response { .. }
        )
    }
}
