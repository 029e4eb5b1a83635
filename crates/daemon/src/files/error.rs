//! Error kinds for sandboxed file operations.

use std::io;
use std::path::PathBuf;

use filedeck_protocol::ErrorCode;
use thiserror::Error;

/// Errors that can occur during sandboxed file operations.
///
/// Every variant maps to exactly one [`ErrorCode`] at the HTTP boundary.
#[derive(Debug, Error)]
pub enum FileError {
    /// The resolved path escapes the sandbox root.
    #[error("path escapes the sandbox: {0}")]
    Containment(String),

    /// The target does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// A name is empty, `.`, `..`, or contains a separator.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// The target already exists.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// A directory was expected.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A regular file was expected.
    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    /// Any other filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FileError {
    /// Classify an IO error raised while operating on `path`.
    pub fn from_io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(path.into()),
            io::ErrorKind::AlreadyExists => FileError::AlreadyExists(path.into()),
            io::ErrorKind::NotADirectory => FileError::NotADirectory(path.into()),
            _ => FileError::Io(err),
        }
    }

    /// The API error code this error surfaces as.
    pub fn code(&self) -> ErrorCode {
        match self {
            FileError::Containment(_) => ErrorCode::Forbidden,
            FileError::NotFound(_) => ErrorCode::NotFound,
            FileError::InvalidName(_)
            | FileError::NotADirectory(_)
            | FileError::NotAFile(_) => ErrorCode::InvalidRequest,
            FileError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            FileError::Io(_) => ErrorCode::InternalError,
        }
    }

    /// Message safe to show to the client.
    ///
    /// IO failures are reported generically; their detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            FileError::Containment(_) => "access outside the sandbox is forbidden".to_string(),
            FileError::NotFound(_) => "file or directory not found".to_string(),
            FileError::InvalidName(name) => format!("invalid name: {:?}", name),
            FileError::AlreadyExists(_) => "a file or folder with that name already exists".to_string(),
            FileError::NotADirectory(_) => "path is not a directory".to_string(),
            FileError::NotAFile(_) => "path is not a file".to_string(),
            FileError::Io(_) => "internal server error".to_string(),
        }
    }
}

/// Result type for file operations.
pub type FileResult<T> = Result<T, FileError>;
